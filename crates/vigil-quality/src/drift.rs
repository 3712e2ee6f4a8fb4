//! Drift comparison and severity ladder.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use vigil_stats::CohortStats;

/// Drift severity. Ordering matters: later variants override earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftSeverity {
    Ok,
    Watch,
    Warn,
    Critical,
}

impl fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Watch => write!(f, "WATCH"),
            Self::Warn => write!(f, "WARN"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Confidence in a drift verdict, driven by LIVE cohort size.
///
/// Callers with LOW confidence must not apply governance changes purely
/// from drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftConfidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for DriftConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// One rung of the severity ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriftRung {
    /// Absolute hit-rate delta in percentage points.
    pub hit_rate_pp: f64,
    /// Sharpe-like delta at or below which the rung fires.
    pub sharpe: f64,
    /// Expectancy delta at or below which the rung fires.
    pub expectancy: f64,
}

/// Drift thresholds. Never hard-code these at call sites; products with
/// different ladders pass their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftThresholds {
    #[serde(default = "default_watch")]
    pub watch: DriftRung,
    #[serde(default = "default_warn")]
    pub warn: DriftRung,
    #[serde(default = "default_critical")]
    pub critical: DriftRung,
    /// LIVE sample count for HIGH confidence.
    #[serde(default = "default_high_confidence_n")]
    pub high_confidence_n: usize,
    /// LIVE sample count for MEDIUM confidence.
    #[serde(default = "default_medium_confidence_n")]
    pub medium_confidence_n: usize,
}

fn default_watch() -> DriftRung {
    DriftRung {
        hit_rate_pp: 2.0,
        sharpe: -0.10,
        expectancy: -0.003,
    }
}

fn default_warn() -> DriftRung {
    DriftRung {
        hit_rate_pp: 5.0,
        sharpe: -0.25,
        expectancy: -0.006,
    }
}

fn default_critical() -> DriftRung {
    DriftRung {
        hit_rate_pp: 8.0,
        sharpe: -0.40,
        expectancy: -0.010,
    }
}

fn default_high_confidence_n() -> usize {
    90
}

fn default_medium_confidence_n() -> usize {
    30
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            watch: default_watch(),
            warn: default_warn(),
            critical: default_critical(),
            high_confidence_n: default_high_confidence_n(),
            medium_confidence_n: default_medium_confidence_n(),
        }
    }
}

/// Deltas between LIVE and a baseline cohort. `None` means one side lacked
/// the statistic; a missing delta never fires a rung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftDelta {
    /// LIVE minus baseline hit rate, in percentage points.
    pub hit_rate_pp: Option<f64>,
    pub sharpe: Option<f64>,
    pub expectancy: Option<f64>,
    /// LIVE minus baseline calibration error.
    pub calibration_error: Option<f64>,
}

/// One LIVE-vs-baseline drift comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftComparison {
    /// Vintage label of the baseline (e.g. "V2008", "LIVE-90D").
    pub baseline: String,
    pub live_total: usize,
    pub baseline_total: usize,
    pub delta: DriftDelta,
    pub severity: DriftSeverity,
    pub confidence: DriftConfidence,
}

/// What the platform should do about a drift verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftRecommendation {
    Maintain,
    Monitor,
    Reduce,
    Halt,
}

impl fmt::Display for DriftRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maintain => write!(f, "MAINTAIN"),
            Self::Monitor => write!(f, "MONITOR"),
            Self::Reduce => write!(f, "REDUCE"),
            Self::Halt => write!(f, "HALT"),
        }
    }
}

fn rung_fires(delta: &DriftDelta, rung: &DriftRung) -> bool {
    delta.hit_rate_pp.map_or(false, |d| d.abs() >= rung.hit_rate_pp)
        || delta.sharpe.map_or(false, |d| d <= rung.sharpe)
        || delta.expectancy.map_or(false, |d| d <= rung.expectancy)
}

fn confidence_for(live_total: usize, thresholds: &DriftThresholds) -> DriftConfidence {
    if live_total >= thresholds.high_confidence_n {
        DriftConfidence::High
    } else if live_total >= thresholds.medium_confidence_n {
        DriftConfidence::Medium
    } else {
        DriftConfidence::Low
    }
}

/// Compare a LIVE cohort against a baseline.
///
/// An empty LIVE cohort is CRITICAL with LOW confidence: the model has gone
/// silent, which is itself the worst signal, but with nothing to measure.
pub fn compare_cohorts(
    baseline_label: &str,
    live: &CohortStats,
    baseline: &CohortStats,
    thresholds: &DriftThresholds,
) -> DriftComparison {
    if live.total == 0 {
        return DriftComparison {
            baseline: baseline_label.to_string(),
            live_total: 0,
            baseline_total: baseline.total,
            delta: DriftDelta {
                hit_rate_pp: None,
                sharpe: None,
                expectancy: None,
                calibration_error: None,
            },
            severity: DriftSeverity::Critical,
            confidence: DriftConfidence::Low,
        };
    }

    let delta = DriftDelta {
        hit_rate_pp: match (live.win_rate, baseline.win_rate) {
            (Some(l), Some(b)) => Some((l - b) * 100.0),
            _ => None,
        },
        sharpe: match (live.sharpe_like, baseline.sharpe_like) {
            (Some(l), Some(b)) => Some(l - b),
            _ => None,
        },
        expectancy: match (live.expectancy, baseline.expectancy) {
            (Some(l), Some(b)) => Some(l - b),
            _ => None,
        },
        calibration_error: match (live.calibration_error, baseline.calibration_error) {
            (Some(l), Some(b)) => Some(l - b),
            _ => None,
        },
    };

    // CRITICAL overrides WARN overrides WATCH overrides OK.
    let severity = if rung_fires(&delta, &thresholds.critical) {
        DriftSeverity::Critical
    } else if rung_fires(&delta, &thresholds.warn) {
        DriftSeverity::Warn
    } else if rung_fires(&delta, &thresholds.watch) {
        DriftSeverity::Watch
    } else {
        DriftSeverity::Ok
    };

    let comparison = DriftComparison {
        baseline: baseline_label.to_string(),
        live_total: live.total,
        baseline_total: baseline.total,
        delta,
        severity,
        confidence: confidence_for(live.total, thresholds),
    };

    debug!(
        baseline = %comparison.baseline,
        severity = %comparison.severity,
        confidence = %comparison.confidence,
        "drift comparison"
    );

    comparison
}

/// Worst severity across comparisons; OK when there are none.
pub fn overall_severity(comparisons: &[DriftComparison]) -> DriftSeverity {
    comparisons
        .iter()
        .map(|c| c.severity)
        .max()
        .unwrap_or(DriftSeverity::Ok)
}

/// Recommendation for a severity.
pub fn recommendation_for(severity: DriftSeverity) -> DriftRecommendation {
    match severity {
        DriftSeverity::Ok => DriftRecommendation::Maintain,
        DriftSeverity::Watch => DriftRecommendation::Monitor,
        DriftSeverity::Warn => DriftRecommendation::Reduce,
        DriftSeverity::Critical => DriftRecommendation::Halt,
    }
}
