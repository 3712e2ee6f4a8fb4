//! Error types for vigil-scheduler.

use thiserror::Error;

/// Scheduler error types.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Another worker holds the lease; yield silently.
    #[error("Job already running: {0}")]
    AlreadyRunning(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job disabled: {0}")]
    Disabled(String),

    #[error("Unknown run: {0}")]
    UnknownRun(String),

    #[error("Invalid schedule '{schedule}': {reason}")]
    InvalidSchedule { schedule: String, reason: String },
}

impl SchedulerError {
    /// Concurrency losses are expected; the other worker does the work.
    pub fn is_concurrency_loss(&self) -> bool {
        matches!(self, Self::AlreadyRunning(_))
    }
}

/// Result type alias for scheduler operations.
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
