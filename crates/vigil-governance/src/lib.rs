//! Governance state machine.
//!
//! One state per symbol: NORMAL → PROTECTION → FROZEN_ONLY → HALT, with
//! timed latches, cooldowns, and a recovery counter. A state entered with a
//! latch only escalates until the latch expires; de-escalation happens one
//! step at a time after `recovery_days` consecutive clear evaluations.
//! Admin overrides can set any state directly and always write an audit
//! record.
//!
//! The machine never talks to the resolver; the pipeline reads the state
//! and hands the resolver a directive derived from it.

pub mod engine;
pub mod state;

pub use engine::{EvaluationOutcome, GovernanceConfig, GovernanceEngine, GovernanceInput};
pub use state::{GovernanceActor, GovernanceAudit, GovernanceState};
