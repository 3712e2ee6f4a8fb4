//! Alert event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::{fingerprint_of, Symbol};

/// Alert event taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    RegimeShift,
    CrisisEnter,
    CrisisExit,
    HealthDrop,
    TailSpike,
    Drift,
}

impl AlertType {
    /// Suppression priority within a batch; lower ranks win.
    pub fn priority(&self) -> u8 {
        match self {
            Self::CrisisEnter => 0,
            Self::CrisisExit => 1,
            Self::TailSpike => 2,
            Self::HealthDrop => 3,
            Self::RegimeShift => 4,
            Self::Drift => 5,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegimeShift => write!(f, "REGIME_SHIFT"),
            Self::CrisisEnter => write!(f, "CRISIS_ENTER"),
            Self::CrisisExit => write!(f, "CRISIS_EXIT"),
            Self::HealthDrop => write!(f, "HEALTH_DROP"),
            Self::TailSpike => write!(f, "TAIL_SPIKE"),
            Self::Drift => write!(f, "DRIFT"),
        }
    }
}

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Info,
    High,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Why an alert was blocked; `None` means it was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    None,
    Dedup,
    Quota,
    Cooldown,
    BatchSuppressed,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Dedup => write!(f, "DEDUP"),
            Self::Quota => write!(f, "QUOTA"),
            Self::Cooldown => write!(f, "COOLDOWN"),
            Self::BatchSuppressed => write!(f, "BATCH_SUPPRESSED"),
        }
    }
}

/// An alert event raised by quality/drift or governance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub symbol: Symbol,
    pub alert_type: AlertType,
    pub level: AlertLevel,
    pub message: String,
    /// Context discriminator folded into the fingerprint (e.g. the
    /// governance transition or drift baseline that raised the event).
    pub key_context: String,
    pub triggered_at: DateTime<Utc>,
}

impl AlertEvent {
    /// Deterministic dedup fingerprint.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&[
            self.symbol.as_str(),
            &self.alert_type.to_string(),
            &self.level.to_string(),
            &self.key_context,
        ])
    }
}

/// Audit-log entry for one gate decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub symbol: Symbol,
    pub alert_type: AlertType,
    pub level: AlertLevel,
    pub message: String,
    pub fingerprint: String,
    pub triggered_at: DateTime<Utc>,
    pub decided_at: DateTime<Utc>,
    pub blocked_by: BlockReason,
}

impl AlertRecord {
    pub fn was_sent(&self) -> bool {
        self.blocked_by == BlockReason::None
    }
}
