/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Keys must be non-empty.
    #[error("record key must not be empty")]
    EmptyKey,

    /// The query document could not be parsed into a selector.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The cursor was read after it had been closed.
    #[error("query cursor already closed")]
    CursorClosed,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A journal frame header is damaged but intact frames follow it, so the
    /// file cannot be cut back to a valid prefix.
    #[error("journal corrupt at byte offset {offset}")]
    CorruptJournal { offset: u64 },

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
