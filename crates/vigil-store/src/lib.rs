//! Snapshot and outcome stores.
//!
//! The two arenas in this crate are the platform's only shared mutable
//! state. Both are keyed by value (fingerprint / snapshot reference) and
//! support exactly the two primitives the lifecycle needs:
//! - insert-if-absent (`put`), linearizable per key
//! - compare-and-set resolution (`resolve`), linearizable per snapshot
//!
//! Every other component derives its state from these stores by re-query,
//! never by holding live references to records.

pub mod error;
pub mod journal;
pub mod journaled;
pub mod outcome;
pub mod snapshot;

pub use error::{StoreError, StoreResult};
pub use journal::JsonLinesJournal;
pub use journaled::{JournaledOutcomeStore, JournaledSnapshotStore};
pub use outcome::{MemoryOutcomeStore, OutcomeFilter, OutcomeStore};
pub use snapshot::{MemorySnapshotStore, PutReceipt, SnapshotFilter, SnapshotStore};
