//! Error types for vigil-store.

use thiserror::Error;

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Compare-and-set lost: the snapshot is already RESOLVED. The other
    /// worker did the work; callers yield silently.
    #[error("Snapshot already resolved: {0}")]
    AlreadyResolved(String),

    /// No record under the given key.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Concurrency losses are not failures; the caller yields.
    pub fn is_concurrency_loss(&self) -> bool {
        matches!(self, Self::AlreadyResolved(_))
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
