//! Error types for vigil-tracker.

use thiserror::Error;

/// Tracker error types.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] vigil_scheduler::SchedulerError),
}

/// Result type alias for tracker operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
