//! Outcome tracker.
//!
//! Periodically finds snapshots whose horizon has elapsed, fetches the
//! terminal price from the oracle, grades WIN/LOSS/DRAW, and writes the
//! resolution through the snapshot store's compare-and-set followed by the
//! outcome store's insert-if-absent. Partial failures are repaired on the
//! next run from the snapshot's own resolved fields; nothing is ever
//! dropped, and one snapshot's failure never aborts the batch.

pub mod error;
pub mod tracker;

pub use error::{TrackerError, TrackerResult};
pub use tracker::{OutcomeTracker, TrackerConfig, TrackerReport};
