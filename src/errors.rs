use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("spawn error: {0}")]
    Spawn(String),
    #[error("program not found: {0}")]
    ProgramNotFound(String),
    #[error("io error: {0}")]
    Io(String),
}
