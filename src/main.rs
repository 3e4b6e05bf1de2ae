use std::sync::Arc;

mod config;
mod diagnose;
mod errors;
mod health;
mod launch;
mod logging;
mod orchestrator;
mod preflight;
mod supervisor;

use crate::config::{AppConfig, Command};
use crate::health::HttpHealthProbe;
use crate::orchestrator::{Bootstrap, BootstrapOutcome, Orchestrator};
use crate::preflight::EnvSnapshot;

#[tokio::main]
async fn main() {
    logging::init_logging();

    let cfg = AppConfig::from_env_and_args();
    if let Err(e) = cfg.validate() {
        tracing::error!(config_error = %e, "invalid config");
        std::process::exit(2);
    }

    // Ambient state is captured once here; components only see the snapshot.
    let env = EnvSnapshot::capture();

    let exit = match cfg.command {
        Some(Command::Doctor) => {
            let report = diagnose::run(&cfg, &env).await;
            print!("{}", report.render());
            if report.passed() {
                0
            } else {
                1
            }
        }
        None => run_bootstrap(cfg, &env).await,
    };
    std::process::exit(exit);
}

async fn run_bootstrap(cfg: AppConfig, env: &EnvSnapshot) -> i32 {
    let probe = Arc::new(HttpHealthProbe::new(&cfg.polling_policy()));
    let check_mode = cfg.check;
    let orch = Orchestrator::new(cfg);

    let Bootstrap { outcome, child } = match orch.bootstrap(env, probe).await {
        Ok(boot) => boot,
        Err(e) => {
            tracing::error!(error = %e, "bootstrap failed");
            return 3;
        }
    };

    // Presentation is kept apart from the decision logic above.
    println!("{}", outcome.summary());
    for line in outcome.failure_lines() {
        println!("{line}");
    }

    match (&outcome, child) {
        (BootstrapOutcome::Healthy { .. }, Some(child)) if check_mode => {
            orch.teardown(&child).await;
            outcome.exit_code()
        }
        (BootstrapOutcome::Healthy { .. }, Some(child)) => orch.supervise(child).await,
        _ => outcome.exit_code(),
    }
}
