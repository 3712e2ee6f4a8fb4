//! Forecast snapshot writer.
//!
//! Builds immutable snapshots from raw model outputs and persists them
//! through the snapshot store's insert-if-absent. Everything the snapshot
//! freezes (direction, confidence, prices, resolve time) is computed
//! here, once, at creation; no later component recomputes any of it.

pub mod error;
pub mod writer;

pub use error::{SnapshotError, SnapshotResult};
pub use writer::{SnapshotWriter, WriteReport};
