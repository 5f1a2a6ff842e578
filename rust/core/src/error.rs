use thiserror::Error;

/// Errors surfaced by the measurement harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The run configuration is unusable; detected before any worker starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A summary was requested over zero samples.
    #[error("no samples recorded")]
    EmptySampleSet,

    /// A worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
