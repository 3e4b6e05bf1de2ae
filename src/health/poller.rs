use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::probe::{HealthProbe, HealthProbeResult, ProbeHistory};
use super::PollingPolicy;

const HISTORY_CAPACITY: usize = 32;

/// Terminal poller states. Cancellation is deliberately distinct from
/// exhaustion: "was told to stop" is not "gave up waiting".
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Healthy {
        attempts: u32,
        elapsed: Duration,
    },
    Exhausted {
        attempts: u32,
        last: Option<HealthProbeResult>,
    },
    Cancelled {
        attempts: u32,
    },
}

#[derive(Debug)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub history: Vec<HealthProbeResult>,
}

pub struct HealthPoller {
    policy: PollingPolicy,
    probe: Arc<dyn HealthProbe>,
}

impl HealthPoller {
    pub fn new(policy: PollingPolicy, probe: Arc<dyn HealthProbe>) -> Self {
        Self { policy, probe }
    }

    /// Drives Polling until Healthy, Exhausted, or Cancelled. Probes
    /// immediately on entry, then waits `poll_interval` between attempts.
    /// An in-flight probe is abandoned, not awaited, when the token fires.
    pub async fn run(&self, cancel: CancellationToken) -> PollReport {
        let started = Instant::now();
        let mut history = ProbeHistory::new(HISTORY_CAPACITY);
        let mut attempts: u32 = 0;

        loop {
            if started.elapsed() >= self.policy.max_wall_clock {
                return PollReport {
                    outcome: PollOutcome::Exhausted {
                        attempts,
                        last: history.last().cloned(),
                    },
                    history: history.snapshot(),
                };
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return PollReport {
                        outcome: PollOutcome::Cancelled { attempts },
                        history: history.snapshot(),
                    };
                }
                r = self.probe.probe() => r,
            };
            attempts += 1;
            let succeeded = result.succeeded;
            tracing::debug!(attempt = attempts, succeeded, detail = %result.describe(), "health probe");
            history.push(result);

            if succeeded {
                return PollReport {
                    outcome: PollOutcome::Healthy {
                        attempts,
                        elapsed: started.elapsed(),
                    },
                    history: history.snapshot(),
                };
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return PollReport {
                        outcome: PollOutcome::Cancelled { attempts },
                        history: history.snapshot(),
                    };
                }
                _ = sleep(self.policy.poll_interval) => {}
            }
        }
    }
}
