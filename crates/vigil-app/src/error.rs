//! Error types for vigil-app.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error(transparent)]
    Core(#[from] vigil_core::CoreError),

    #[error(transparent)]
    Store(#[from] vigil_store::StoreError),

    #[error(transparent)]
    Snapshot(#[from] vigil_snapshot::SnapshotError),

    #[error(transparent)]
    Tracker(#[from] vigil_tracker::TrackerError),

    #[error(transparent)]
    Scheduler(#[from] vigil_scheduler::SchedulerError),

    #[error(transparent)]
    Pipeline(#[from] vigil_pipeline::PipelineError),

    #[error(transparent)]
    Resolver(#[from] vigil_resolver::ResolverError),

    #[error(transparent)]
    Telemetry(#[from] vigil_telemetry::TelemetryError),
}

/// Result type alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
