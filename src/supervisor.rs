use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};

use crate::errors::BootstrapError;
use crate::launch::LaunchPlan;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The one OS-level process owned by a bootstrap session. No other
/// component signals or inspects the child directly.
pub struct ChildProcessHandle {
    pub pid: u32,
    pub started_at: OffsetDateTime,
    child: Mutex<Child>,
}

impl ChildProcessHandle {
    /// Non-blocking exit check; `-1` stands in for signal-terminated
    /// children that carry no exit code.
    fn poll_exit(&self) -> Option<i32> {
        let mut child = self.child.lock();
        child
            .try_wait()
            .ok()
            .flatten()
            .map(|status| status.code().unwrap_or(-1))
    }

    fn signal_term(&self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.lock().start_kill();
        }
    }

    fn force_kill(&self) {
        let _ = self.child.lock().start_kill();
    }
}

impl Drop for ChildProcessHandle {
    fn drop(&mut self) {
        // Best-effort termination to avoid zombie processes
        let _ = self.child.get_mut().start_kill();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Shutdown {
    pub forced: bool,
}

pub struct ProcessSupervisor {
    grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Spawns the command described by the plan with inherited standard
    /// streams, so the server's own logs flow through unmodified. The plan's
    /// env overrides are merged on top of the ambient environment.
    pub fn spawn(&self, plan: &LaunchPlan) -> Result<ChildProcessHandle, BootstrapError> {
        let bin = resolve_program(&plan.program)?;
        let mut cmd = Command::new(&bin);
        for a in &plan.args {
            cmd.arg(a);
        }
        cmd.envs(plan.env_overrides.iter().cloned());

        let child = cmd
            .spawn()
            .map_err(|e| BootstrapError::Spawn(format!("failed to start {bin}: {e}")))?;
        let pid = child.id().unwrap_or_default();
        tracing::info!(%pid, program = %bin, "child process started");

        Ok(ChildProcessHandle {
            pid,
            started_at: OffsetDateTime::now_utc(),
            child: Mutex::new(child),
        })
    }

    /// Suspends until the child exits on its own; never holds the handle
    /// lock across an await so concurrent shutdown stays possible.
    pub async fn wait(&self, handle: &ChildProcessHandle) -> i32 {
        loop {
            if let Some(code) = handle.poll_exit() {
                return code;
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    /// Two-phase shutdown: SIGTERM relay, then a forced kill issued exactly
    /// once if the child has not exited when the grace period elapses.
    pub async fn shutdown(&self, handle: &ChildProcessHandle) -> Shutdown {
        let uptime = OffsetDateTime::now_utc() - handle.started_at;
        tracing::info!(
            pid = %handle.pid,
            uptime_s = uptime.whole_seconds(),
            "requesting graceful exit"
        );
        handle.signal_term();

        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline {
            if handle.poll_exit().is_some() {
                return Shutdown { forced: false };
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }

        tracing::warn!(pid = %handle.pid, "grace period elapsed, killing child");
        handle.force_kill();
        loop {
            if handle.poll_exit().is_some() {
                return Shutdown { forced: true };
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }
    }
}

fn resolve_program(program: &str) -> Result<String, BootstrapError> {
    if Path::new(program).exists() {
        return Ok(program.to_string());
    }
    which::which(program)
        .map(|p| p.to_string_lossy().into_owned())
        .map_err(|e| BootstrapError::ProgramNotFound(format!("{program}: {e}")))
}

/// Resolves when the orchestrator itself is asked to stop.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            _ = sigint.recv() => tracing::info!("received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c");
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::launch::LaunchMode;

    fn sh_plan(script: &str) -> LaunchPlan {
        LaunchPlan {
            mode: LaunchMode::Compiled,
            program: "/bin/sh".into(),
            args: vec!["-c".into(), script.into()],
            env_overrides: vec![],
        }
    }

    #[tokio::test]
    async fn wait_returns_child_exit_code() {
        let sup = ProcessSupervisor::new(Duration::from_secs(1));
        let handle = sup.spawn(&sh_plan("exit 7")).expect("spawn");
        assert_eq!(sup.wait(&handle).await, 7);
    }

    #[tokio::test]
    async fn spawn_unknown_program_fails() {
        let sup = ProcessSupervisor::new(Duration::from_secs(1));
        let plan = LaunchPlan {
            mode: LaunchMode::Compiled,
            program: "definitely-not-a-real-binary-4a1c".into(),
            args: vec![],
            env_overrides: vec![],
        };
        assert!(sup.spawn(&plan).is_err());
    }

    #[tokio::test]
    async fn env_overrides_reach_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env.txt");
        let script = format!("printf '%s' \"$BOOT_PROBE\" > {}", out.display());
        let mut plan = sh_plan(&script);
        plan.env_overrides = vec![("BOOT_PROBE".into(), "production".into())];

        let sup = ProcessSupervisor::new(Duration::from_secs(1));
        let handle = sup.spawn(&plan).expect("spawn");
        assert_eq!(sup.wait(&handle).await, 0);
        assert_eq!(std::fs::read_to_string(out).unwrap(), "production");
    }

    #[tokio::test]
    async fn cooperative_child_exits_without_forced_kill() {
        let sup = ProcessSupervisor::new(Duration::from_secs(5));
        let handle = sup.spawn(&sh_plan("sleep 30")).expect("spawn");
        let shutdown = sup.shutdown(&handle).await;
        assert!(!shutdown.forced);
    }

    #[tokio::test]
    async fn stubborn_child_is_killed_after_grace() {
        let sup = ProcessSupervisor::new(Duration::from_millis(200));
        let handle = sup
            .spawn(&sh_plan("trap '' TERM; sleep 30"))
            .expect("spawn");
        let shutdown = sup.shutdown(&handle).await;
        assert!(shutdown.forced);
    }
}
