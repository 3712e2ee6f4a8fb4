//! Cohort statistics rollups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rolling::{
    calibration_error, effective_sample_count, expectancy, hit_rate, max_drawdown,
    rolling_hit_rate, sharpe_like, stability,
};
use crate::sample::OutcomeSample;

/// Statistics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Minimum samples before classifications may be trusted.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Exponential decay time constant in days.
    #[serde(default = "default_decay_tau_days")]
    pub decay_tau_days: f64,
    /// Default rolling window size.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_min_samples() -> usize {
    10
}

fn default_decay_tau_days() -> f64 {
    45.0
}

fn default_window_size() -> usize {
    30
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            decay_tau_days: default_decay_tau_days(),
            window_size: default_window_size(),
        }
    }
}

/// Derived cohort rollup.
///
/// Regenerated, never authoritative: always reproducible from the outcome
/// store. Undefined statistics are `None`, never sentinel numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub draws: usize,
    pub window_size: usize,
    pub win_rate: Option<f64>,
    pub rolling_win_rate: Option<f64>,
    pub calibration_error: Option<f64>,
    pub expectancy: Option<f64>,
    pub sharpe_like: Option<f64>,
    pub max_drawdown: f64,
    pub effective_sample_count: f64,
    pub stability: Option<f64>,
    /// True when `total >= min_samples`; classifications must treat
    /// insufficient cohorts as NEUTRAL.
    pub sufficient: bool,
}

impl CohortStats {
    /// Compute the full rollup from chronologically ordered samples.
    pub fn compute(
        samples: &[OutcomeSample],
        config: &StatsConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let wins = samples.iter().filter(|s| s.is_win()).count();
        let losses = samples.iter().filter(|s| s.is_loss()).count();
        let draws = samples.len() - wins - losses;

        Self {
            total: samples.len(),
            wins,
            losses,
            draws,
            window_size: config.window_size,
            win_rate: hit_rate(samples),
            rolling_win_rate: rolling_hit_rate(samples, config.window_size),
            calibration_error: calibration_error(samples),
            expectancy: expectancy(samples),
            sharpe_like: sharpe_like(samples),
            max_drawdown: max_drawdown(samples),
            effective_sample_count: effective_sample_count(samples, now, config.decay_tau_days),
            stability: stability(samples, now, config.decay_tau_days),
            sufficient: samples.len() >= config.min_samples,
        }
    }

    /// Empty rollup for a cohort with no outcomes yet.
    pub fn empty(config: &StatsConfig) -> Self {
        Self::compute(&[], config, DateTime::<Utc>::MIN_UTC)
    }

    /// Average confidence over the samples, if any.
    pub fn avg_confidence(samples: &[OutcomeSample]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().map(|s| s.confidence).sum::<f64>() / samples.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use vigil_core::ForecastResult;

    fn sample(result: ForecastResult, day: i64) -> OutcomeSample {
        let ret = match result {
            ForecastResult::Win => 0.01,
            ForecastResult::Loss => -0.01,
            ForecastResult::Draw => 0.0,
        };
        OutcomeSample {
            result,
            realized_return: ret,
            confidence: 0.6,
            resolved_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::days(day),
        }
    }

    #[test]
    fn test_compute_counts_and_sufficiency() {
        let config = StatsConfig {
            min_samples: 3,
            ..StatsConfig::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();

        let samples = vec![
            sample(ForecastResult::Win, 0),
            sample(ForecastResult::Loss, 1),
            sample(ForecastResult::Draw, 2),
        ];
        let stats = CohortStats::compute(&samples, &config, now);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.draws, 1);
        assert!(stats.sufficient);
        assert!((stats.win_rate.unwrap() - 0.5).abs() < 1e-12);

        let short = CohortStats::compute(&samples[..2], &config, now);
        assert!(!short.sufficient);
    }

    #[test]
    fn test_empty_rollup_is_all_undefined() {
        let stats = CohortStats::empty(&StatsConfig::default());
        assert_eq!(stats.total, 0);
        assert!(stats.win_rate.is_none());
        assert!(stats.rolling_win_rate.is_none());
        assert!(stats.sharpe_like.is_none());
        assert!(!stats.sufficient);
    }
}
