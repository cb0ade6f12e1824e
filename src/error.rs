use std::io;

/// Failures that abort a benchmark run.
///
/// Nothing here is retried: a benchmark measured under a failing environment
/// produces meaningless numbers, so every variant propagates to the binary.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{operation} failed: {detail}")]
    OperationFailure {
        operation: &'static str,
        detail: String,
    },
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("document codec: {0}")]
    Codec(#[from] serde_json::Error),
}

impl BenchError {
    pub fn operation(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::OperationFailure {
            operation,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
