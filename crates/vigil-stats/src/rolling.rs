//! Pure statistic functions over ordered outcome samples.
//!
//! All functions expect samples in chronological `resolved_at` order (the
//! outcome store's persisted order). Undefined statistics return `None`
//! rather than a sentinel value.

use chrono::{DateTime, Utc};

use crate::sample::OutcomeSample;

/// Hit rate over decided outcomes: `wins / (wins + losses)`.
///
/// DRAWs are excluded from the denominator. `None` when nothing is decided.
pub fn hit_rate(samples: &[OutcomeSample]) -> Option<f64> {
    let decided = samples.iter().filter(|s| s.is_decided()).count();
    if decided == 0 {
        return None;
    }
    let wins = samples.iter().filter(|s| s.is_win()).count();
    Some(wins as f64 / decided as f64)
}

/// Rolling hit rate over the trailing window:
/// `wins_in_last_n / min(n, total)`.
///
/// Unlike [`hit_rate`], DRAWs stay in the denominator here, so a drawy
/// stretch dilutes the rolling rate. `None` on an empty stream.
pub fn rolling_hit_rate(samples: &[OutcomeSample], window: usize) -> Option<f64> {
    if samples.is_empty() || window == 0 {
        return None;
    }
    let n = window.min(samples.len());
    let tail = &samples[samples.len() - n..];
    let wins = tail.iter().filter(|s| s.is_win()).count();
    Some(wins as f64 / n as f64)
}

/// Mean realized return: `Σ realizedReturn / n`.
pub fn expectancy(samples: &[OutcomeSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().map(|s| s.realized_return).sum();
    Some(sum / samples.len() as f64)
}

/// Maximum drawdown of the cumulative signed-return series.
///
/// Returned as a non-negative fraction (0.05 = a 5-point giveback from the
/// running peak). Zero for monotone-up series and for empty input.
pub fn max_drawdown(samples: &[OutcomeSample]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for sample in samples {
        cumulative += sample.realized_return;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = peak - cumulative;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Sharpe-like ratio: `expectancy / stddev(returns)` (sample stddev).
///
/// `None` when n < 2 or the returns have no variance.
pub fn sharpe_like(samples: &[OutcomeSample]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let mean = expectancy(samples)?;
    let variance: f64 = samples
        .iter()
        .map(|s| {
            let d = s.realized_return - mean;
            d * d
        })
        .sum::<f64>()
        / (samples.len() - 1) as f64;
    let stddev = variance.sqrt();
    if stddev <= 0.0 {
        return None;
    }
    Some(mean / stddev)
}

/// Decay weight for a sample: `exp(-ageDays / tau)`.
fn decay_weight(sample: &OutcomeSample, now: DateTime<Utc>, tau_days: f64) -> f64 {
    let age_days = (now - sample.resolved_at).num_seconds().max(0) as f64 / 86_400.0;
    (-age_days / tau_days).exp()
}

/// Effective sample count under exponential decay: `(Σw)² / Σw²`.
///
/// Equals n for equal weights and shrinks toward 1 as the weight mass
/// concentrates on recent samples.
pub fn effective_sample_count(samples: &[OutcomeSample], now: DateTime<Utc>, tau_days: f64) -> f64 {
    if samples.is_empty() || tau_days <= 0.0 {
        return 0.0;
    }
    let mut sum_w = 0.0_f64;
    let mut sum_w2 = 0.0_f64;
    for sample in samples {
        let w = decay_weight(sample, now, tau_days);
        sum_w += w;
        sum_w2 += w * w;
    }
    if sum_w2 == 0.0 {
        return 0.0;
    }
    (sum_w * sum_w) / sum_w2
}

/// Stability of the win/loss stream: `1 − 2·weightedStdDev(binary outcomes)`.
///
/// Binary outcomes are decided samples only (win = 1, loss = 0), weighted
/// by the same decay as [`effective_sample_count`]. A coin-flip stream has
/// stddev 0.5 and stability 0; a constant stream has stability 1.
pub fn stability(samples: &[OutcomeSample], now: DateTime<Utc>, tau_days: f64) -> Option<f64> {
    let decided: Vec<&OutcomeSample> = samples.iter().filter(|s| s.is_decided()).collect();
    if decided.is_empty() || tau_days <= 0.0 {
        return None;
    }

    let mut sum_w = 0.0_f64;
    let mut weighted_mean = 0.0_f64;
    for sample in &decided {
        let w = decay_weight(sample, now, tau_days);
        sum_w += w;
        weighted_mean += w * if sample.is_win() { 1.0 } else { 0.0 };
    }
    if sum_w == 0.0 {
        return None;
    }
    weighted_mean /= sum_w;

    let mut weighted_var = 0.0_f64;
    for sample in &decided {
        let w = decay_weight(sample, now, tau_days);
        let x = if sample.is_win() { 1.0 } else { 0.0 };
        weighted_var += w * (x - weighted_mean) * (x - weighted_mean);
    }
    weighted_var /= sum_w;

    Some(1.0 - 2.0 * weighted_var.sqrt())
}

/// Calibration error: `|avgConfidence − winRate|`.
///
/// `None` when the hit rate is undefined.
pub fn calibration_error(samples: &[OutcomeSample]) -> Option<f64> {
    let rate = hit_rate(samples)?;
    let avg_confidence: f64 =
        samples.iter().map(|s| s.confidence).sum::<f64>() / samples.len() as f64;
    Some((avg_confidence - rate).abs())
}
