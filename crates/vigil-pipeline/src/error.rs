//! Error types for vigil-pipeline.

use thiserror::Error;

/// Pipeline error types.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Another worker holds the pipeline lease.
    #[error("Pipeline already running: {0}")]
    AlreadyRunning(String),

    #[error("Store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("Snapshot writer error: {0}")]
    Snapshot(#[from] vigil_snapshot::SnapshotError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] vigil_tracker::TrackerError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] vigil_scheduler::SchedulerError),
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
