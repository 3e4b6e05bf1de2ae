use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Compiled,
    SourceInterpreted,
}

/// Immutable description of how to start the server. Computed once per
/// bootstrap attempt; starting the process is the supervisor's job.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub mode: LaunchMode,
    pub program: String,
    pub args: Vec<String>,
    pub env_overrides: Vec<(String, String)>,
}

/// Picks compiled vs source-interpreted launch from a single existence
/// check on the artifact path. Production mode is forced in both branches,
/// fallback included, so runtime behavior does not depend on build state.
pub fn locate(cfg: &AppConfig) -> LaunchPlan {
    let env_overrides = vec![
        ("NODE_ENV".to_string(), "production".to_string()),
        ("PORT".to_string(), cfg.port.to_string()),
    ];
    if cfg.artifact_path.is_file() {
        LaunchPlan {
            mode: LaunchMode::Compiled,
            program: cfg.runtime_bin.clone(),
            args: vec![cfg.artifact_path.to_string_lossy().into_owned()],
            env_overrides,
        }
    } else {
        LaunchPlan {
            mode: LaunchMode::SourceInterpreted,
            program: cfg.source_runner.clone(),
            args: vec![cfg.source_entry.to_string_lossy().into_owned()],
            env_overrides,
        }
    }
}
