use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::health::{HttpHealthProbe, PollingPolicy};
use crate::preflight::{EnvSnapshot, OPTIONAL_KEYS, REQUIRED_KEYS};

const PORT_CHECK_TIMEOUT: Duration = Duration::from_secs(1);
const DOCTOR_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Env,
    File,
    Port,
    Health,
}

impl CheckKind {
    /// Fixed per-kind prefix keeps every report line independently
    /// parseable.
    fn prefix(self) -> &'static str {
        match self {
            CheckKind::Env => "env",
            CheckKind::File => "file",
            CheckKind::Port => "port",
            CheckKind::Health => "health",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub label: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for c in &self.checks {
            let verdict = if c.passed { "ok  " } else { "fail" };
            out.push_str(&format!(
                "{verdict} {:<6} {} {}\n",
                c.kind.prefix(),
                c.label,
                c.detail
            ));
        }
        let passed = self.checks.iter().filter(|c| c.passed).count();
        out.push_str(&format!(
            "doctor: {}/{} checks passed\n",
            passed,
            self.checks.len()
        ));
        out
    }
}

/// Runs the full battery unconditionally; one check failing never stops
/// the others. Read-only and safe against a running instance.
pub async fn run(cfg: &AppConfig, env: &EnvSnapshot) -> DoctorReport {
    let mut checks = env_checks(env);
    checks.extend(file_checks(cfg));
    for path in &cfg.doctor_paths {
        let present = path.is_file();
        checks.push(CheckResult {
            kind: CheckKind::File,
            label: path.display().to_string(),
            passed: present,
            detail: if present { "present" } else { "missing" }.to_string(),
        });
    }
    checks.push(port_check(&cfg.host, cfg.port).await);
    for port in &cfg.doctor_ports {
        checks.push(port_check(&cfg.host, *port).await);
    }
    checks.push(health_check(cfg).await);
    DoctorReport { checks }
}

fn env_checks(env: &EnvSnapshot) -> Vec<CheckResult> {
    let mut checks = Vec::with_capacity(REQUIRED_KEYS.len() + OPTIONAL_KEYS.len());
    for key in REQUIRED_KEYS {
        let set = env.is_set(key);
        checks.push(CheckResult {
            kind: CheckKind::Env,
            label: key.to_string(),
            passed: set,
            detail: if set { "set" } else { "missing" }.to_string(),
        });
    }
    for key in OPTIONAL_KEYS {
        let set = env.is_set(key);
        checks.push(CheckResult {
            kind: CheckKind::Env,
            label: key.to_string(),
            passed: true,
            detail: if set { "set" } else { "not set (optional)" }.to_string(),
        });
    }
    checks
}

fn file_checks(cfg: &AppConfig) -> Vec<CheckResult> {
    let source_present = cfg.source_entry.is_file();
    let artifact_present = cfg.artifact_path.is_file();
    vec![
        CheckResult {
            kind: CheckKind::File,
            label: cfg.source_entry.display().to_string(),
            passed: source_present,
            detail: if source_present { "present" } else { "missing" }.to_string(),
        },
        // Advisory: either build state is launchable.
        CheckResult {
            kind: CheckKind::File,
            label: cfg.artifact_path.display().to_string(),
            passed: true,
            detail: if artifact_present {
                "present (compiled mode)"
            } else {
                "absent (source fallback)"
            }
            .to_string(),
        },
    ]
}

/// Advisory occupancy check: whether something already listens on the
/// configured port. Meaningful both before startup and against a running
/// instance, so it reports state rather than failing.
async fn port_check(host: &str, port: u16) -> CheckResult {
    let addr = format!("{host}:{port}");
    let in_use = matches!(
        timeout(PORT_CHECK_TIMEOUT, TcpStream::connect(&addr)).await,
        Ok(Ok(_))
    );
    CheckResult {
        kind: CheckKind::Port,
        label: addr,
        passed: true,
        detail: if in_use { "in use" } else { "free" }.to_string(),
    }
}

async fn health_check(cfg: &AppConfig) -> CheckResult {
    let policy = PollingPolicy {
        per_attempt_timeout: DOCTOR_PROBE_TIMEOUT,
        ..cfg.polling_policy()
    };
    let result = HttpHealthProbe::new(&policy).probe_once().await;
    CheckResult {
        kind: CheckKind::Health,
        label: policy.endpoint_url(),
        passed: result.succeeded,
        detail: result.describe(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn base_cfg() -> AppConfig {
        AppConfig::parse_from(["appboot"])
    }

    #[test]
    fn required_keys_fail_when_missing() {
        let checks = env_checks(&EnvSnapshot::default());
        let required: Vec<_> = checks
            .iter()
            .filter(|c| REQUIRED_KEYS.contains(&c.label.as_str()))
            .collect();
        assert_eq!(required.len(), REQUIRED_KEYS.len());
        assert!(required.iter().all(|c| !c.passed));
    }

    #[test]
    fn optional_keys_never_fail() {
        let checks = env_checks(&EnvSnapshot::default());
        assert!(checks
            .iter()
            .filter(|c| OPTIONAL_KEYS.contains(&c.label.as_str()))
            .all(|c| c.passed));
    }

    #[test]
    fn file_checks_reflect_build_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = base_cfg();
        cfg.source_entry = dir.path().join("index.ts");
        cfg.artifact_path = dir.path().join("index.js");
        std::fs::write(&cfg.source_entry, "// entry").unwrap();

        let checks = file_checks(&cfg);
        assert!(checks[0].passed);
        assert!(checks[1].detail.contains("source fallback"));
    }

    #[tokio::test]
    async fn port_check_detects_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let check = port_check("127.0.0.1", port).await;
        assert!(check.passed);
        assert_eq!(check.detail, "in use");
    }

    #[tokio::test]
    async fn extra_configured_paths_and_ports_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path().join("schema.sql");
        std::fs::write(&extra, "-- schema").unwrap();

        let mut cfg = base_cfg();
        cfg.doctor_paths = vec![extra.clone()];
        cfg.doctor_ports = vec![free_local_port()];

        let report = run(&cfg, &EnvSnapshot::default()).await;
        assert!(report
            .checks
            .iter()
            .any(|c| c.kind == CheckKind::File && c.label == extra.display().to_string() && c.passed));
        assert_eq!(
            report
                .checks
                .iter()
                .filter(|c| c.kind == CheckKind::Port)
                .count(),
            2
        );
    }

    fn free_local_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn battery_always_runs_every_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = base_cfg();
        cfg.source_entry = dir.path().join("missing.ts");
        cfg.artifact_path = dir.path().join("missing.js");
        // An unbound port keeps the probe failing fast.
        let probe_port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        cfg.port = probe_port;

        let report = run(&cfg, &EnvSnapshot::default()).await;
        let expected = REQUIRED_KEYS.len() + OPTIONAL_KEYS.len() + 2 + 1 + 1;
        assert_eq!(report.checks.len(), expected);
        assert!(!report.passed());
    }

    #[test]
    fn render_is_line_oriented_with_fixed_prefixes() {
        let report = DoctorReport {
            checks: vec![
                CheckResult {
                    kind: CheckKind::Env,
                    label: "DATABASE_URL".into(),
                    passed: true,
                    detail: "set".into(),
                },
                CheckResult {
                    kind: CheckKind::Health,
                    label: "http://127.0.0.1:5000/api/health".into(),
                    passed: false,
                    detail: "connection refused".into(),
                },
            ],
        };
        let rendered = report.render();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ok   env"));
        assert!(lines[1].starts_with("fail health"));
        assert_eq!(lines[2], "doctor: 1/2 checks passed");
    }
}
