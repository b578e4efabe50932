use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the sampling engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error("a sampling run is already active for {}", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("round {index} was already recorded")]
    DuplicateRound { index: u32 },

    #[error("round {got} arrived out of order (expected {expected})")]
    RoundOutOfOrder { expected: u32, got: u32 },

    #[error("output directory {} is unavailable: {reason}", path.display())]
    OutputUnavailable { path: PathBuf, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("no completed run to export")]
    NoCompletedRun,

    #[error("no sampling run has been started")]
    NoActiveRun,

    #[error("sampling task failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Failure of a sample provider for a single poll.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sample provider unavailable: {0}")]
    Unavailable(String),

    #[error("failed to run scan command: {0}")]
    Process(String),

    #[error("failed to parse scan output: {0}")]
    Parse(String),
}
