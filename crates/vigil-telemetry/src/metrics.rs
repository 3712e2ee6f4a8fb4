//! Prometheus metrics for the forecast lifecycle.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration
//! failure means duplicate metric names, a fatal configuration error that
//! should crash at startup rather than fail silently. These panics only
//! occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, GaugeVec,
    HistogramVec,
};

/// Snapshots written, by symbol and disposition (inserted/duplicate).
pub static SNAPSHOTS_WRITTEN_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vigil_snapshots_written_total",
        "Total snapshot write attempts",
        &["symbol", "disposition"]
    )
    .unwrap()
});

/// Outcomes resolved, by symbol and result.
pub static OUTCOMES_RESOLVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vigil_outcomes_resolved_total",
        "Total outcomes resolved",
        &["symbol", "result"]
    )
    .unwrap()
});

/// Alert gate decisions, by level and disposition.
pub static ALERT_DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vigil_alert_decisions_total",
        "Total alert gate decisions",
        &["level", "blocked_by"]
    )
    .unwrap()
});

/// Governance mode per symbol (1 = active mode, 0 = inactive).
pub static GOVERNANCE_MODE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "vigil_governance_mode",
        "Current governance mode per symbol (1=active)",
        &["symbol", "mode"]
    )
    .unwrap()
});

/// Pipeline step durations in milliseconds.
pub static PIPELINE_STEP_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "vigil_pipeline_step_duration_ms",
        "Pipeline step duration in milliseconds",
        &["step", "status"],
        vec![1.0, 5.0, 20.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 30000.0, 120000.0]
    )
    .unwrap()
});

/// Tracker batch sizes.
pub static TRACKER_BATCH_SIZE: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "vigil_tracker_batch_size",
        "Due snapshots processed per tracker batch",
        &["job"],
        vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 200.0, 500.0]
    )
    .unwrap()
});

/// Set the governance mode gauge family for a symbol to a single mode.
pub fn set_governance_mode(symbol: &str, active_mode: &str) {
    for mode in ["NORMAL", "PROTECTION", "FROZEN_ONLY", "HALT"] {
        let value = if mode == active_mode { 1.0 } else { 0.0 };
        GOVERNANCE_MODE.with_label_values(&[symbol, mode]).set(value);
    }
}
