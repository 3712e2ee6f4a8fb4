//! Price oracle port for outcome resolution.
//!
//! The tracker asks the oracle for the close nearest a snapshot's
//! `resolve_at`; the oracle may answer with a bar whose timestamp differs
//! from the requested one by up to a tolerance (default: one daily bar).
//! When no bar covers the request the lookup fails with `PriceUnavailable`
//! and the snapshot simply stays PENDING for the next run.

pub mod error;
pub mod history;
pub mod provider;

pub use error::{OracleError, OracleResult};
pub use history::HistoricalPriceOracle;
pub use provider::{BoxFuture, FixedPriceOracle, PricePoint, PriceProvider};
