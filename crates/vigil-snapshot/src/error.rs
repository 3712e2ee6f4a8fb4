//! Error types for vigil-snapshot.

use thiserror::Error;

/// Snapshot writer error types.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Contract violation: the model output is out of bounds. Nothing is
    /// persisted.
    #[error("Invalid snapshot input: {0}")]
    InvalidSnapshotInput(String),

    /// Transient store failure; the whole snapshot attempt is re-enqueued,
    /// never retried under a different fingerprint.
    #[error("Store error: {0}")]
    Store(#[from] vigil_store::StoreError),
}

impl From<vigil_core::CoreError> for SnapshotError {
    fn from(err: vigil_core::CoreError) -> Self {
        Self::InvalidSnapshotInput(err.to_string())
    }
}

/// Result type alias for snapshot writer operations.
pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;
