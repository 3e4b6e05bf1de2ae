use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::errors::BootstrapError;
use crate::health::{HealthPoller, HealthProbe, HealthProbeResult, PollOutcome};
use crate::launch;
use crate::preflight::{self, EnvSnapshot};
use crate::supervisor::{shutdown_signal, ChildProcessHandle, ProcessSupervisor, Shutdown};

/// Terminal result of one bootstrap attempt. Fully determines the process
/// exit code; rendering for humans happens elsewhere.
#[derive(Debug)]
pub enum BootstrapOutcome {
    Healthy {
        attempts: u32,
        elapsed: Duration,
    },
    Unhealthy {
        attempts: u32,
        last: Option<HealthProbeResult>,
        history: Vec<HealthProbeResult>,
    },
    ChildExitedEarly {
        code: i32,
    },
    PreconditionFailed {
        missing: Vec<String>,
    },
    ShutdownRequested,
}

impl BootstrapOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapOutcome::Healthy { .. } => 0,
            BootstrapOutcome::PreconditionFailed { .. } => 2,
            BootstrapOutcome::Unhealthy { .. } => 4,
            BootstrapOutcome::ChildExitedEarly { .. } => 5,
            BootstrapOutcome::ShutdownRequested => 130,
        }
    }

    /// The single operator-facing status line.
    pub fn summary(&self) -> String {
        match self {
            BootstrapOutcome::Healthy { attempts, elapsed } => format!(
                "server healthy after {attempts} probe(s) in {}ms",
                elapsed.as_millis()
            ),
            BootstrapOutcome::Unhealthy { attempts, last, .. } => {
                let detail = last
                    .as_ref()
                    .map(|r| r.describe())
                    .unwrap_or_else(|| "no probe completed".to_string());
                format!("server started but never became healthy ({attempts} probes; last: {detail})")
            }
            BootstrapOutcome::ChildExitedEarly { code } => {
                format!("server exited with code {code} before becoming healthy")
            }
            BootstrapOutcome::PreconditionFailed { missing } => {
                format!("missing required configuration: {}", missing.join(", "))
            }
            BootstrapOutcome::ShutdownRequested => "server was asked to stop during startup".into(),
        }
    }

    /// Retained probe failures, one line each, for exhaustion diagnosis.
    pub fn failure_lines(&self) -> Vec<String> {
        match self {
            BootstrapOutcome::Unhealthy { history, .. } => history
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.succeeded)
                .map(|(i, r)| format!("probe {}: {}", i + 1, r.describe()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub struct Bootstrap {
    pub outcome: BootstrapOutcome,
    pub child: Option<ChildProcessHandle>,
}

pub struct Orchestrator {
    cfg: AppConfig,
    supervisor: ProcessSupervisor,
}

impl Orchestrator {
    pub fn new(cfg: AppConfig) -> Self {
        let supervisor = ProcessSupervisor::new(cfg.grace_period());
        Self { cfg, supervisor }
    }

    /// One end-to-end attempt: preflight, locate, spawn, then watch child
    /// exit, shutdown signals, and the poller concurrently. Each phase runs
    /// at most once; nothing is retried across phases.
    pub async fn bootstrap(
        &self,
        env: &EnvSnapshot,
        probe: Arc<dyn HealthProbe>,
    ) -> Result<Bootstrap, BootstrapError> {
        let report = preflight::check(env);
        if !report.ok() {
            tracing::error!(missing = ?report.missing, "required configuration missing");
            return Ok(Bootstrap {
                outcome: BootstrapOutcome::PreconditionFailed {
                    missing: report.missing,
                },
                child: None,
            });
        }
        if !report.optional_missing.is_empty() {
            tracing::info!(keys = ?report.optional_missing, "optional credentials not set");
        }

        let plan = launch::locate(&self.cfg);
        tracing::info!(mode = ?plan.mode, program = %plan.program, "launch plan selected");

        let child = self.supervisor.spawn(&plan)?;

        // Spawn is complete; polling may begin. The token lets an early
        // child exit or a signal abandon an in-flight probe promptly.
        let cancel = CancellationToken::new();
        let poller = HealthPoller::new(self.cfg.polling_policy(), probe);
        let mut poll_task = tokio::spawn({
            let cancel = cancel.clone();
            async move { poller.run(cancel).await }
        });

        tokio::select! {
            code = self.supervisor.wait(&child) => {
                cancel.cancel();
                let _ = (&mut poll_task).await;
                tracing::error!(code, "child exited before a health verdict");
                Ok(Bootstrap {
                    outcome: BootstrapOutcome::ChildExitedEarly { code },
                    child: Some(child),
                })
            }
            _ = shutdown_signal() => {
                cancel.cancel();
                let _ = (&mut poll_task).await;
                let Shutdown { forced } = self.supervisor.shutdown(&child).await;
                tracing::info!(forced, "child stopped during startup");
                Ok(Bootstrap {
                    outcome: BootstrapOutcome::ShutdownRequested,
                    child: Some(child),
                })
            }
            res = &mut poll_task => {
                let poll = res.map_err(|e| BootstrapError::Io(e.to_string()))?;
                match poll.outcome {
                    PollOutcome::Healthy { attempts, elapsed } => Ok(Bootstrap {
                        outcome: BootstrapOutcome::Healthy { attempts, elapsed },
                        child: Some(child),
                    }),
                    PollOutcome::Exhausted { attempts, last } => {
                        let Shutdown { forced } = self.supervisor.shutdown(&child).await;
                        tracing::error!(attempts, forced, "health budget exhausted");
                        Ok(Bootstrap {
                            outcome: BootstrapOutcome::Unhealthy {
                                attempts,
                                last,
                                history: poll.history,
                            },
                            child: Some(child),
                        })
                    }
                    // Only this function holds the token, so a cancelled
                    // poller here means a stop request raced the join.
                    PollOutcome::Cancelled { .. } => Ok(Bootstrap {
                        outcome: BootstrapOutcome::ShutdownRequested,
                        child: Some(child),
                    }),
                }
            }
        }
    }

    /// Post-health supervision: stay attached until the child exits on its
    /// own (exit code propagated verbatim) or a stop request arrives.
    pub async fn supervise(&self, child: ChildProcessHandle) -> i32 {
        tokio::select! {
            code = self.supervisor.wait(&child) => {
                tracing::info!(code, "child exited");
                code
            }
            _ = shutdown_signal() => {
                let Shutdown { forced } = self.supervisor.shutdown(&child).await;
                tracing::info!(forced, "shutdown complete");
                0
            }
        }
    }

    /// Used by check mode after the verdict is in.
    pub async fn teardown(&self, child: &ChildProcessHandle) -> Shutdown {
        self.supervisor.shutdown(child).await
    }
}
