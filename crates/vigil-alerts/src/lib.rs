//! Alert taxonomy and policy gate.
//!
//! Events emerging from quality/drift and governance transitions pass
//! through a policy gate before delivery: fingerprint dedup within a
//! cooldown window, a rolling-24h quota for INFO/HIGH per symbol, a 1h
//! per-type cooldown for CRITICAL, and per-level batch caps with a fixed
//! priority order. Every decision, sent or blocked, lands in the audit
//! log.

pub mod gate;
pub mod sink;
pub mod types;

pub use gate::{AlertDecision, AlertGate, AlertPolicyConfig};
pub use sink::{AlertSink, BoxFuture, RecordingSink, SendReceipt};
pub use types::{AlertEvent, AlertLevel, AlertRecord, AlertType, BlockReason};
