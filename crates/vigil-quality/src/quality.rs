//! Quality classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_stats::CohortStats;

/// Cohort quality state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityState {
    Good,
    Neutral,
    Weak,
}

impl fmt::Display for QualityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "GOOD"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Weak => write!(f, "WEAK"),
        }
    }
}

/// Quality thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Win rate at or above which a cohort is GOOD.
    #[serde(default = "default_good_threshold")]
    pub good_threshold: f64,
    /// Win rate at or above which a cohort is NEUTRAL.
    #[serde(default = "default_neutral_threshold")]
    pub neutral_threshold: f64,
    /// Below this sample count the state is undefined and reported as
    /// NEUTRAL with `sample_capped` set.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_good_threshold() -> f64 {
    0.60
}

fn default_neutral_threshold() -> f64 {
    0.50
}

fn default_min_samples() -> usize {
    10
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            good_threshold: default_good_threshold(),
            neutral_threshold: default_neutral_threshold(),
            min_samples: default_min_samples(),
        }
    }
}

/// Quality classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub state: QualityState,
    pub win_rate: Option<f64>,
    pub total: usize,
    /// True when the cohort was too small to classify; callers must treat
    /// the state as NEUTRAL-by-default, not as evidence of health.
    pub sample_capped: bool,
}

/// Classify a cohort rollup.
pub fn classify_quality(stats: &CohortStats, config: &QualityConfig) -> QualityAssessment {
    let capped = stats.total < config.min_samples;
    let state = match (capped, stats.win_rate) {
        (true, _) | (false, None) => QualityState::Neutral,
        (false, Some(rate)) => {
            if rate >= config.good_threshold {
                QualityState::Good
            } else if rate >= config.neutral_threshold {
                QualityState::Neutral
            } else {
                QualityState::Weak
            }
        }
    };

    QualityAssessment {
        state,
        win_rate: stats.win_rate,
        total: stats.total,
        sample_capped: capped || stats.win_rate.is_none(),
    }
}
