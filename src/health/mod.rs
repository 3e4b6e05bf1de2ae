use std::time::Duration;

pub mod poller;
pub mod probe;

pub use poller::{HealthPoller, PollOutcome, PollReport};
pub use probe::{HealthProbe, HealthProbeResult, HttpHealthProbe, ProbeHistory};

/// Every duration the poller obeys, stated explicitly. Values come from the
/// configuration surface; there are no fallbacks buried in code paths.
#[derive(Debug, Clone)]
pub struct PollingPolicy {
    pub host: String,
    pub port: u16,
    pub endpoint_path: String,
    pub per_attempt_timeout: Duration,
    pub poll_interval: Duration,
    pub max_wall_clock: Duration,
}

impl PollingPolicy {
    pub fn endpoint_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.endpoint_path)
    }
}
