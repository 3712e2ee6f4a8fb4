//! Alert policy gate.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vigil_core::Symbol;

use crate::types::{AlertEvent, AlertLevel, AlertRecord, AlertType, BlockReason};

/// Alert policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPolicyConfig {
    /// Rolling-24h quota for INFO/HIGH alerts per symbol. CRITICAL bypasses
    /// the quota entirely.
    #[serde(default = "default_quota_per_window")]
    pub quota_per_window: usize,
    /// Quota window hours.
    #[serde(default = "default_quota_window_hours")]
    pub quota_window_hours: i64,
    /// Fingerprint dedup cooldown for INFO/HIGH.
    #[serde(default = "default_cooldown_info_high_hours")]
    pub cooldown_info_high_hours: i64,
    /// Fingerprint dedup and per-type cooldown for CRITICAL.
    #[serde(default = "default_cooldown_critical_hours")]
    pub cooldown_critical_hours: i64,
    /// Per-run batch caps by level.
    #[serde(default = "default_batch_cap_critical")]
    pub batch_cap_critical: usize,
    #[serde(default = "default_batch_cap_high")]
    pub batch_cap_high: usize,
    #[serde(default = "default_batch_cap_info")]
    pub batch_cap_info: usize,
}

fn default_quota_per_window() -> usize {
    3
}

fn default_quota_window_hours() -> i64 {
    24
}

fn default_cooldown_info_high_hours() -> i64 {
    6
}

fn default_cooldown_critical_hours() -> i64 {
    1
}

fn default_batch_cap_critical() -> usize {
    1
}

fn default_batch_cap_high() -> usize {
    2
}

fn default_batch_cap_info() -> usize {
    3
}

impl Default for AlertPolicyConfig {
    fn default() -> Self {
        Self {
            quota_per_window: default_quota_per_window(),
            quota_window_hours: default_quota_window_hours(),
            cooldown_info_high_hours: default_cooldown_info_high_hours(),
            cooldown_critical_hours: default_cooldown_critical_hours(),
            batch_cap_critical: default_batch_cap_critical(),
            batch_cap_high: default_batch_cap_high(),
            batch_cap_info: default_batch_cap_info(),
        }
    }
}

impl AlertPolicyConfig {
    fn cooldown_for(&self, level: AlertLevel) -> Duration {
        match level {
            AlertLevel::Critical => Duration::hours(self.cooldown_critical_hours),
            _ => Duration::hours(self.cooldown_info_high_hours),
        }
    }

    fn batch_cap(&self, level: AlertLevel) -> usize {
        match level {
            AlertLevel::Critical => self.batch_cap_critical,
            AlertLevel::High => self.batch_cap_high,
            AlertLevel::Info => self.batch_cap_info,
        }
    }
}

/// One gate decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDecision {
    pub record: AlertRecord,
}

impl AlertDecision {
    pub fn was_sent(&self) -> bool {
        self.record.was_sent()
    }
}

#[derive(Default)]
struct GateState {
    /// Send timestamps of INFO/HIGH alerts per symbol, trimmed to the
    /// quota window.
    quota_window: HashMap<Symbol, VecDeque<DateTime<Utc>>>,
    /// Last send time per fingerprint.
    last_sent_by_fingerprint: HashMap<String, DateTime<Utc>>,
    /// Last CRITICAL send per (symbol, type).
    last_critical_by_type: HashMap<(Symbol, AlertType), DateTime<Utc>>,
    /// Append-only audit log of every decision.
    audit_log: Vec<AlertRecord>,
}

/// Alert policy gate.
///
/// Thread-safe; decisions for a batch are made atomically under one lock so
/// the quota can never be exceeded by concurrent batches.
pub struct AlertGate {
    config: AlertPolicyConfig,
    state: Mutex<GateState>,
}

impl AlertGate {
    /// Bound on retained audit records.
    const MAX_AUDIT: usize = 4096;

    pub fn new(config: AlertPolicyConfig) -> Self {
        Self {
            config,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Decide a batch of events.
    ///
    /// Events are ranked by type priority (then level, then arrival order)
    /// before the per-level batch caps apply, so a CRISIS_ENTER is never
    /// starved by a pile of DRIFT events. Every decision is appended to the
    /// audit log.
    pub fn decide_batch(&self, mut events: Vec<AlertEvent>, now: DateTime<Utc>) -> Vec<AlertDecision> {
        events.sort_by(|a, b| {
            a.alert_type
                .priority()
                .cmp(&b.alert_type.priority())
                .then(b.level.cmp(&a.level))
        });

        let mut state = self.state.lock();
        let mut sent_at_level: HashMap<AlertLevel, usize> = HashMap::new();
        let mut decisions = Vec::with_capacity(events.len());

        for event in events {
            let blocked_by = self.decide_one(&mut state, &event, &sent_at_level, now);

            if blocked_by == BlockReason::None {
                *sent_at_level.entry(event.level).or_insert(0) += 1;
                state
                    .last_sent_by_fingerprint
                    .insert(event.fingerprint(), now);
                if event.level == AlertLevel::Critical {
                    state
                        .last_critical_by_type
                        .insert((event.symbol.clone(), event.alert_type), now);
                } else {
                    state
                        .quota_window
                        .entry(event.symbol.clone())
                        .or_default()
                        .push_back(now);
                }
                info!(
                    symbol = %event.symbol,
                    alert_type = %event.alert_type,
                    level = %event.level,
                    "alert passed gate"
                );
            } else {
                debug!(
                    symbol = %event.symbol,
                    alert_type = %event.alert_type,
                    level = %event.level,
                    blocked_by = %blocked_by,
                    "alert blocked"
                );
            }

            let record = AlertRecord {
                symbol: event.symbol.clone(),
                alert_type: event.alert_type,
                level: event.level,
                message: event.message.clone(),
                fingerprint: event.fingerprint(),
                triggered_at: event.triggered_at,
                decided_at: now,
                blocked_by,
            };
            state.audit_log.push(record.clone());
            decisions.push(AlertDecision { record });
        }

        if state.audit_log.len() > Self::MAX_AUDIT {
            let excess = state.audit_log.len() - Self::MAX_AUDIT;
            state.audit_log.drain(..excess);
        }

        decisions
    }

    fn decide_one(
        &self,
        state: &mut GateState,
        event: &AlertEvent,
        sent_at_level: &HashMap<AlertLevel, usize>,
        now: DateTime<Utc>,
    ) -> BlockReason {
        // Fingerprint dedup within the level's cooldown window.
        let cooldown = self.config.cooldown_for(event.level);
        if let Some(last) = state.last_sent_by_fingerprint.get(&event.fingerprint()) {
            if now - *last < cooldown {
                return BlockReason::Dedup;
            }
        }

        if event.level == AlertLevel::Critical {
            // CRITICAL bypasses the quota but honors a per-type cooldown.
            let key = (event.symbol.clone(), event.alert_type);
            if let Some(last) = state.last_critical_by_type.get(&key) {
                if now - *last < Duration::hours(self.config.cooldown_critical_hours) {
                    return BlockReason::Cooldown;
                }
            }
        } else {
            // Rolling-window quota for INFO/HIGH.
            let window = Duration::hours(self.config.quota_window_hours);
            let timestamps = state.quota_window.entry(event.symbol.clone()).or_default();
            while timestamps.front().is_some_and(|&t| now - t >= window) {
                timestamps.pop_front();
            }
            if timestamps.len() >= self.config.quota_per_window {
                return BlockReason::Quota;
            }
        }

        // Per-level batch cap.
        let sent = sent_at_level.get(&event.level).copied().unwrap_or(0);
        if sent >= self.config.batch_cap(event.level) {
            return BlockReason::BatchSuppressed;
        }

        BlockReason::None
    }

    /// Snapshot of the audit log, newest last.
    pub fn audit_log(&self) -> Vec<AlertRecord> {
        self.state.lock().audit_log.clone()
    }

    /// Sent INFO/HIGH count inside the current window for a symbol.
    pub fn window_count(&self, symbol: &Symbol, now: DateTime<Utc>) -> usize {
        let window = Duration::hours(self.config.quota_window_hours);
        let state = self.state.lock();
        state
            .quota_window
            .get(symbol)
            .map(|timestamps| timestamps.iter().filter(|&&t| now - t < window).count())
            .unwrap_or(0)
    }
}
