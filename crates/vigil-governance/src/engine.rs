//! Governance evaluation engine.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vigil_core::{GovernanceMode, Symbol};
use vigil_quality::{DriftConfidence, DriftSeverity, QualityState};

use crate::state::{GovernanceActor, GovernanceAudit, GovernanceState};

/// Governance thresholds and cooldowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Consecutive all-clear evaluations before stepping one state down.
    #[serde(default = "default_recovery_days")]
    pub recovery_days: u32,
    /// Consecutive WEAK-quality evaluations that force HALT.
    #[serde(default = "default_weak_streak_for_halt")]
    pub weak_streak_for_halt: u32,
    /// Tail-risk bounds on `mc_p95_dd` for PROTECTION / FROZEN_ONLY / HALT.
    #[serde(default = "default_tail_protection")]
    pub tail_protection: f64,
    #[serde(default = "default_tail_frozen")]
    pub tail_frozen: f64,
    #[serde(default = "default_tail_halt")]
    pub tail_halt: f64,
    /// Latch cooldown hours per escalated state.
    #[serde(default = "default_protection_cooldown_hours")]
    pub protection_cooldown_hours: i64,
    #[serde(default = "default_frozen_cooldown_hours")]
    pub frozen_cooldown_hours: i64,
    #[serde(default = "default_halt_cooldown_hours")]
    pub halt_cooldown_hours: i64,
}

fn default_recovery_days() -> u32 {
    3
}

fn default_weak_streak_for_halt() -> u32 {
    3
}

fn default_tail_protection() -> f64 {
    0.25
}

fn default_tail_frozen() -> f64 {
    0.40
}

fn default_tail_halt() -> f64 {
    0.55
}

fn default_protection_cooldown_hours() -> i64 {
    24
}

fn default_frozen_cooldown_hours() -> i64 {
    48
}

fn default_halt_cooldown_hours() -> i64 {
    72
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            recovery_days: default_recovery_days(),
            weak_streak_for_halt: default_weak_streak_for_halt(),
            tail_protection: default_tail_protection(),
            tail_frozen: default_tail_frozen(),
            tail_halt: default_tail_halt(),
            protection_cooldown_hours: default_protection_cooldown_hours(),
            frozen_cooldown_hours: default_frozen_cooldown_hours(),
            halt_cooldown_hours: default_halt_cooldown_hours(),
        }
    }
}

impl GovernanceConfig {
    fn cooldown_for(&self, mode: GovernanceMode) -> Duration {
        match mode {
            GovernanceMode::Protection => Duration::hours(self.protection_cooldown_hours),
            GovernanceMode::FrozenOnly => Duration::hours(self.frozen_cooldown_hours),
            GovernanceMode::Halt => Duration::hours(self.halt_cooldown_hours),
            GovernanceMode::Normal => Duration::zero(),
        }
    }
}

/// One daily-evaluation input for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceInput {
    pub drift_severity: DriftSeverity,
    pub drift_confidence: DriftConfidence,
    pub quality: QualityState,
    /// Monte-Carlo P95 drawdown estimate.
    pub mc_p95_dd: f64,
    /// Policy hash of the configuration currently producing ACTIVE
    /// snapshots; frozen on entry into FROZEN_ONLY.
    pub active_policy_hash: String,
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub previous: GovernanceMode,
    pub current: GovernanceMode,
    pub changed: bool,
    pub audit: Option<GovernanceAudit>,
}

/// Governance engine holding every symbol's state.
///
/// Thread-safe; transitions for a symbol are serialized through the state
/// table lock, matching the single-writer discipline of the pipeline.
pub struct GovernanceEngine {
    config: GovernanceConfig,
    states: Mutex<HashMap<Symbol, GovernanceState>>,
}

impl GovernanceEngine {
    pub fn new(config: GovernanceConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Current state for a symbol, created lazily at NORMAL.
    pub fn get(&self, symbol: &Symbol, now: DateTime<Utc>) -> GovernanceState {
        let mut states = self.states.lock();
        states
            .entry(symbol.clone())
            .or_insert_with(|| GovernanceState::new(symbol.clone(), now))
            .clone()
    }

    /// Escalation target for an input, if any rung fires.
    ///
    /// Drift-driven transitions require at least MEDIUM confidence; a LOW
    /// confidence verdict must never move the mode on its own. Tail-risk
    /// and quality-streak conditions are confidence-independent.
    fn escalation_target(&self, input: &GovernanceInput, weak_streak: u32) -> Option<GovernanceMode> {
        let drift_actionable = input.drift_confidence >= DriftConfidence::Medium;

        if (drift_actionable && input.drift_severity == DriftSeverity::Critical)
            || input.mc_p95_dd >= self.config.tail_halt
            || weak_streak >= self.config.weak_streak_for_halt
        {
            return Some(GovernanceMode::Halt);
        }
        if (drift_actionable && input.drift_severity == DriftSeverity::Warn)
            || (input.mc_p95_dd >= self.config.tail_frozen && input.mc_p95_dd < self.config.tail_halt)
        {
            return Some(GovernanceMode::FrozenOnly);
        }
        if (drift_actionable && input.drift_severity == DriftSeverity::Watch)
            || (input.mc_p95_dd >= self.config.tail_protection
                && input.mc_p95_dd < self.config.tail_frozen)
        {
            return Some(GovernanceMode::Protection);
        }
        None
    }

    /// Run one daily evaluation for a symbol.
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        input: &GovernanceInput,
        now: DateTime<Utc>,
    ) -> EvaluationOutcome {
        let mut states = self.states.lock();
        let state = states
            .entry(symbol.clone())
            .or_insert_with(|| GovernanceState::new(symbol.clone(), now));

        let previous = state.mode;
        state.updated_at = now;

        if input.quality == QualityState::Weak {
            state.weak_streak += 1;
        } else {
            state.weak_streak = 0;
        }

        let target = self.escalation_target(input, state.weak_streak);

        match target {
            Some(target) if target > state.mode => {
                // Escalation is always allowed, latched or not.
                let audit = GovernanceAudit {
                    at: now,
                    actor: GovernanceActor::System,
                    from_mode: state.mode,
                    to_mode: target,
                    reason: format!(
                        "drift={} ({}) quality={} weak_streak={} mcP95DD={:.3}",
                        input.drift_severity,
                        input.drift_confidence,
                        input.quality,
                        state.weak_streak,
                        input.mc_p95_dd
                    ),
                };
                warn!(
                    %symbol,
                    from = %audit.from_mode,
                    to = %audit.to_mode,
                    reason = %audit.reason,
                    "governance escalation"
                );
                state.mode = target;
                state.latch_until = Some(now + self.config.cooldown_for(target));
                state.consecutive_healthy_days = 0;
                if target == GovernanceMode::FrozenOnly && state.frozen_policy_hash.is_none() {
                    state.frozen_policy_hash = Some(input.active_policy_hash.clone());
                }
                state.push_audit(audit.clone());
                EvaluationOutcome {
                    previous,
                    current: state.mode,
                    changed: true,
                    audit: Some(audit),
                }
            }
            Some(re_entered) => {
                // Condition persists at or below the current mode: refresh
                // the latch if it would extend, and reset recovery.
                if re_entered == state.mode {
                    let refreshed = now + self.config.cooldown_for(state.mode);
                    if state.latch_until.map_or(true, |until| refreshed > until) {
                        state.latch_until = Some(refreshed);
                    }
                }
                state.consecutive_healthy_days = 0;
                EvaluationOutcome {
                    previous,
                    current: state.mode,
                    changed: false,
                    audit: None,
                }
            }
            None => {
                // All clear. Recovery counting only starts once the latch
                // has expired.
                if state.mode == GovernanceMode::Normal {
                    return EvaluationOutcome {
                        previous,
                        current: state.mode,
                        changed: false,
                        audit: None,
                    };
                }
                if state.is_latched(now) {
                    state.consecutive_healthy_days = 0;
                    return EvaluationOutcome {
                        previous,
                        current: state.mode,
                        changed: false,
                        audit: None,
                    };
                }

                state.consecutive_healthy_days += 1;
                if state.consecutive_healthy_days >= self.config.recovery_days {
                    let target = state.mode.step_down();
                    let audit = GovernanceAudit {
                        at: now,
                        actor: GovernanceActor::System,
                        from_mode: state.mode,
                        to_mode: target,
                        reason: format!(
                            "all clear for {} consecutive evaluations",
                            state.consecutive_healthy_days
                        ),
                    };
                    info!(
                        %symbol,
                        from = %audit.from_mode,
                        to = %audit.to_mode,
                        "governance recovery step"
                    );
                    state.mode = target;
                    state.latch_until = None;
                    state.consecutive_healthy_days = 0;
                    if state.mode < GovernanceMode::FrozenOnly {
                        state.frozen_policy_hash = None;
                    }
                    state.push_audit(audit.clone());
                    return EvaluationOutcome {
                        previous,
                        current: state.mode,
                        changed: true,
                        audit: Some(audit),
                    };
                }

                EvaluationOutcome {
                    previous,
                    current: state.mode,
                    changed: false,
                    audit: None,
                }
            }
        }
    }

    /// Admin override: set any mode directly, with an audit record.
    pub fn override_mode(
        &self,
        symbol: &Symbol,
        mode: GovernanceMode,
        now: DateTime<Utc>,
        reason: &str,
    ) -> GovernanceAudit {
        let mut states = self.states.lock();
        let state = states
            .entry(symbol.clone())
            .or_insert_with(|| GovernanceState::new(symbol.clone(), now));

        let audit = GovernanceAudit {
            at: now,
            actor: GovernanceActor::Admin,
            from_mode: state.mode,
            to_mode: mode,
            reason: reason.to_string(),
        };
        warn!(%symbol, from = %audit.from_mode, to = %mode, reason, "governance admin override");

        state.mode = mode;
        state.latch_until = None;
        state.consecutive_healthy_days = 0;
        state.updated_at = now;
        if mode < GovernanceMode::FrozenOnly {
            state.frozen_policy_hash = None;
        }
        state.push_audit(audit.clone());
        audit
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }
}
