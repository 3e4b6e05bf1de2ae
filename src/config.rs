use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::health::PollingPolicy;

#[derive(Debug, Clone, Parser)]
#[command(name = "appboot")]
#[command(about = "Launches the server artifact, supervises it, and verifies liveness", long_about = None)]
pub struct AppConfig {
    /// Port the supervised server listens on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Host the liveness endpoint is probed on.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Compiled entry point; when present the server launches from it.
    #[arg(long, env = "ARTIFACT_PATH", default_value = "dist/index.js")]
    pub artifact_path: PathBuf,

    /// Uncompiled entry point used when no artifact has been built.
    #[arg(long, env = "SOURCE_ENTRY", default_value = "server/index.ts")]
    pub source_entry: PathBuf,

    /// Runtime that executes the compiled artifact.
    #[arg(long, env = "RUNTIME_BIN", default_value = "node")]
    pub runtime_bin: String,

    /// Interpreter that executes the source entry point directly.
    #[arg(long, env = "SOURCE_RUNNER", default_value = "tsx")]
    pub source_runner: String,

    /// Path of the liveness endpoint exposed by the server.
    #[arg(long, env = "HEALTH_PATH", default_value = "/api/health")]
    pub health_path: String,

    /// Timeout for a single health probe.
    #[arg(long, env = "HEALTH_TIMEOUT_MS", default_value_t = 2_000)]
    pub probe_timeout_ms: u64,

    /// Delay between consecutive health probes.
    #[arg(long, env = "HEALTH_INTERVAL_MS", default_value_t = 1_000)]
    pub poll_interval_ms: u64,

    /// Wall-clock budget for the whole health-verification phase.
    #[arg(long, env = "HEALTH_BUDGET_MS", default_value_t = 30_000)]
    pub health_budget_ms: u64,

    /// Grace window between SIGTERM relay and forced kill.
    #[arg(long, env = "SHUTDOWN_GRACE_MS", default_value_t = 10_000)]
    pub grace_ms: u64,

    /// Extra ports for the doctor occupancy checks, comma separated.
    #[arg(long, env = "DOCTOR_PORTS", value_delimiter = ',')]
    pub doctor_ports: Vec<u16>,

    /// Extra paths for the doctor presence checks, comma separated.
    #[arg(long, env = "DOCTOR_PATHS", value_delimiter = ',')]
    pub doctor_paths: Vec<PathBuf>,

    /// Confirm health, stop the child, and exit with the outcome code.
    #[arg(long)]
    pub check: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Run the diagnostic battery and print one line per check.
    Doctor,
}

impl AppConfig {
    pub fn from_env_and_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.probe_timeout_ms == 0 {
            return Err("probe_timeout_ms must be > 0".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be > 0".into());
        }
        if self.health_budget_ms < self.poll_interval_ms {
            return Err("health_budget_ms must be >= poll_interval_ms".into());
        }
        if !self.health_path.starts_with('/') {
            return Err("health_path must start with '/'".into());
        }
        url::Url::parse(&format!("http://{}:{}{}", self.host, self.port, self.health_path))
            .map_err(|_| "host/port/health_path do not form a valid URL".to_string())?;
        Ok(())
    }

    /// Single source of truth for every duration the poller uses.
    pub fn polling_policy(&self) -> PollingPolicy {
        PollingPolicy {
            host: self.host.clone(),
            port: self.port,
            endpoint_path: self.health_path.clone(),
            per_attempt_timeout: Duration::from_millis(self.probe_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_wall_clock: Duration::from_millis(self.health_budget_ms),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}
