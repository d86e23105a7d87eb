//! Error types for the learning memory core.

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds produced by the store, retriever, lifecycle, effectiveness, and
/// concept components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraint(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("migration failure: {0}")]
    MigrationFailure(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is safe to retry (transient storage conditions).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StorageFailure(_) | Error::Cancelled | Error::Io(_))
    }
}
