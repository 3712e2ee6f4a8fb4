//! Forecast snapshot records.
//!
//! A snapshot is written exactly once per fingerprint and is immutable apart
//! from the single PENDING → RESOLVED transition of its evaluation block.
//! The resolved fields live on the snapshot itself so that an outcome write
//! which failed after the resolve can be repaired from the snapshot alone.

use crate::{CohortKey, Direction, ForecastResult, Horizon, Preset, Price, Role, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Evaluation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Pending,
    Resolved,
}

/// Evaluation block of a snapshot.
///
/// All optional fields are `None` while PENDING and set exactly once on
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub status: EvaluationStatus,
    pub real_price: Option<Price>,
    pub result: Option<ForecastResult>,
    pub deviation: Option<f64>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    /// Fresh PENDING evaluation.
    pub fn pending() -> Self {
        Self {
            status: EvaluationStatus::Pending,
            real_price: None,
            result: None,
            deviation: None,
            resolved_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == EvaluationStatus::Resolved
    }
}

/// Fields written atomically by the PENDING → RESOLVED compare-and-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFields {
    pub real_price: Price,
    pub result: ForecastResult,
    pub deviation: f64,
    pub resolved_at: DateTime<Utc>,
}

/// Immutable forecast snapshot, created at t0.
///
/// `fingerprint` is the deterministic dedup key; `created_at`, `resolve_at`,
/// `direction`, `confidence`, `start_price` and `target_price` are frozen at
/// creation and no update path may touch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub fingerprint: String,
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub preset: Preset,
    pub role: Role,
    pub policy_hash: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub resolve_at: DateTime<Utc>,
    pub start_price: Price,
    pub target_price: Price,
    pub expected_move_pct: f64,
    pub direction: Direction,
    pub confidence: f64,
    pub evaluation: Evaluation,
}

impl ForecastSnapshot {
    /// Cohort this snapshot belongs to.
    pub fn cohort(&self) -> CohortKey {
        CohortKey::new(
            self.symbol.clone(),
            self.horizon,
            self.preset,
            self.role,
        )
    }

    /// Whether the horizon has elapsed as of `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.evaluation.is_resolved() && self.resolve_at <= now
    }

    /// Copy of this snapshot with the evaluation flipped to RESOLVED.
    ///
    /// Used by the store inside its compare-and-set critical section; the
    /// caller must have verified the snapshot is still PENDING.
    pub fn with_resolution(&self, fields: &ResolvedFields) -> Self {
        let mut resolved = self.clone();
        resolved.evaluation = Evaluation {
            status: EvaluationStatus::Resolved,
            real_price: Some(fields.real_price),
            result: Some(fields.result),
            deviation: Some(fields.deviation),
            resolved_at: Some(fields.resolved_at),
        };
        resolved
    }
}
