//! Core domain types for the Vigil forecast platform.
//!
//! This crate provides the fundamental types used throughout the forecast
//! lifecycle:
//! - `Symbol`: partition key for all per-asset state
//! - `Horizon`, `Tier`: forecast durations and their weighting tiers
//! - `Preset`, `Role`, `Direction`: forecast classification enums
//! - `Price`: precision-safe price type
//! - `ForecastSnapshot`, `ForecastOutcome`: the immutable lifecycle records
//! - `Clock`: the time port every component draws "now" from

pub mod clock;
pub mod decimal;
pub mod error;
pub mod fingerprint;
pub mod horizon;
pub mod model;
pub mod outcome;
pub mod snapshot;
pub mod symbol;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use fingerprint::{day_bucket, day_label, fingerprint_of, snapshot_fingerprint};
pub use horizon::{Horizon, Tier};
pub use model::ModelOutput;
pub use outcome::ForecastOutcome;
pub use snapshot::{Evaluation, EvaluationStatus, ForecastSnapshot, ResolvedFields};
pub use symbol::Symbol;
pub use types::{CohortKey, Direction, ForecastResult, GovernanceMode, Preset, Role};
