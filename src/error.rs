use thiserror::Error;

/// Errors that can occur when building or using the LSH index.
#[derive(Debug, Error)]
pub enum LshError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("hasher blob does not match current config: {0}")]
    SerializationMismatch(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store operation failed: {0}")]
    Store(String),

    #[error("distance can't be calculated: {0}")]
    Distance(String),

    #[error("training cancelled")]
    TrainCancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for LSH index operations.
pub type Result<T> = std::result::Result<T, LshError>;
