//! Daily orchestration pipeline.
//!
//! Sequences the forecast lifecycle under one scheduler lease:
//! integrity check → snapshot write → outcome resolution → stats refresh →
//! quality and drift → governance → alerts. Each step appends a record to
//! the run's audit trail; a failed step marks its dependents SKIPPED, and
//! cancellation is honored at every step boundary.

pub mod error;
pub mod pipeline;
pub mod ports;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{DailyPipeline, PipelineConfig};
pub use ports::{
    AlwaysOkIntegrity, BoxFuture, FixedModelOutputSource, IntegrityChecker, ModelOutputSource,
    StaticTailRisk, TailRiskSource,
};
