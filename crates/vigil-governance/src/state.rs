//! Governance state records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::{GovernanceMode, Symbol};

/// Who caused a governance transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceActor {
    System,
    Admin,
}

impl fmt::Display for GovernanceActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "SYSTEM"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Audit record of one transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceAudit {
    pub at: DateTime<Utc>,
    pub actor: GovernanceActor,
    pub from_mode: GovernanceMode,
    pub to_mode: GovernanceMode,
    pub reason: String,
}

/// Per-symbol governance state. Created lazily on first access; mutated
/// only through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceState {
    pub symbol: Symbol,
    pub mode: GovernanceMode,
    /// While set and in the future, the machine only escalates.
    pub latch_until: Option<DateTime<Utc>>,
    /// Policy hash frozen on entering FROZEN_ONLY; cleared once the mode
    /// steps below it.
    pub frozen_policy_hash: Option<String>,
    pub consecutive_healthy_days: u32,
    /// Consecutive evaluations with WEAK quality.
    pub weak_streak: u32,
    pub history: Vec<GovernanceAudit>,
    pub updated_at: DateTime<Utc>,
}

impl GovernanceState {
    /// Bound on retained history records.
    pub const MAX_HISTORY: usize = 64;

    pub fn new(symbol: Symbol, now: DateTime<Utc>) -> Self {
        Self {
            symbol,
            mode: GovernanceMode::Normal,
            latch_until: None,
            frozen_policy_hash: None,
            consecutive_healthy_days: 0,
            weak_streak: 0,
            history: Vec::new(),
            updated_at: now,
        }
    }

    /// Whether the latch is still active.
    pub fn is_latched(&self, now: DateTime<Utc>) -> bool {
        self.latch_until.map_or(false, |until| until > now)
    }

    pub(crate) fn push_audit(&mut self, audit: GovernanceAudit) {
        self.history.push(audit);
        if self.history.len() > Self::MAX_HISTORY {
            let excess = self.history.len() - Self::MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}
