use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unrecognized record shape: {0}")]
    UnrecognizedRecord(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
