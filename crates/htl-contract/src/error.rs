use htl_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    /// Required input is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record is absent.
    #[error("{0} does not exist")]
    NotFound(String),

    /// Stored bytes could not be decoded as the expected record.
    #[error("record {key} could not be decoded: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ContractError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidSelector(reason) => Self::Validation(reason),
            StoreError::EmptyKey => Self::Validation("record key must not be empty".into()),
            other => Self::Store(other),
        }
    }
}

pub type ContractResult<T> = Result<T, ContractError>;
