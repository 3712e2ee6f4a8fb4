//! Resolver configuration.

use serde::{Deserialize, Serialize};
use vigil_core::Tier;

/// Resolver weights and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Base tier weight for STRUCTURE horizons.
    #[serde(default = "default_structure_weight")]
    pub structure_weight: f64,
    /// Base tier weight for TACTICAL horizons.
    #[serde(default = "default_tactical_weight")]
    pub tactical_weight: f64,
    /// Base tier weight for TIMING horizons.
    #[serde(default = "default_timing_weight")]
    pub timing_weight: f64,
    /// Bias score threshold: BULL above +τ, BEAR below −τ, NEUTRAL at or
    /// inside. Strictly-greater comparison keeps the exact-threshold case
    /// deterministic.
    #[serde(default = "default_bias_threshold")]
    pub bias_threshold: f64,
    /// Timing score threshold, same comparison rule.
    #[serde(default = "default_timing_threshold")]
    pub timing_threshold: f64,
    /// Minimum strength ratio between opposing bias and timing for a
    /// COUNTER_TREND call.
    #[serde(default = "default_counter_trend_ratio")]
    pub counter_trend_ratio: f64,
    /// Size factor applied in COUNTER_TREND mode.
    #[serde(default = "default_counter_trend_size_factor")]
    pub counter_trend_size_factor: f64,
    /// VOL_SHOCK tier multipliers.
    #[serde(default = "default_vol_shock_structure_boost")]
    pub vol_shock_structure_boost: f64,
    #[serde(default = "default_vol_shock_timing_cut")]
    pub vol_shock_timing_cut: f64,
    /// Bear-drawdown STRUCTURE multiplier.
    #[serde(default = "default_bear_structure_boost")]
    pub bear_structure_boost: f64,
    /// Tail penalty steps over `mc_p95_dd`: below each bound, the matching
    /// penalty; past the last bound, `tail_penalty_max`.
    #[serde(default = "default_tail_bounds")]
    pub tail_bounds: [f64; 3],
    #[serde(default = "default_tail_penalties")]
    pub tail_penalties: [f64; 3],
    #[serde(default = "default_tail_penalty_max")]
    pub tail_penalty_max: f64,
}

fn default_structure_weight() -> f64 {
    0.50
}

fn default_tactical_weight() -> f64 {
    0.30
}

fn default_timing_weight() -> f64 {
    0.20
}

fn default_bias_threshold() -> f64 {
    0.10
}

fn default_timing_threshold() -> f64 {
    0.10
}

fn default_counter_trend_ratio() -> f64 {
    0.5
}

fn default_counter_trend_size_factor() -> f64 {
    0.5
}

fn default_vol_shock_structure_boost() -> f64 {
    1.20
}

fn default_vol_shock_timing_cut() -> f64 {
    0.70
}

fn default_bear_structure_boost() -> f64 {
    1.10
}

fn default_tail_bounds() -> [f64; 3] {
    [0.25, 0.40, 0.55]
}

fn default_tail_penalties() -> [f64; 3] {
    [0.0, 0.3, 0.6]
}

fn default_tail_penalty_max() -> f64 {
    0.9
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            structure_weight: default_structure_weight(),
            tactical_weight: default_tactical_weight(),
            timing_weight: default_timing_weight(),
            bias_threshold: default_bias_threshold(),
            timing_threshold: default_timing_threshold(),
            counter_trend_ratio: default_counter_trend_ratio(),
            counter_trend_size_factor: default_counter_trend_size_factor(),
            vol_shock_structure_boost: default_vol_shock_structure_boost(),
            vol_shock_timing_cut: default_vol_shock_timing_cut(),
            bear_structure_boost: default_bear_structure_boost(),
            tail_bounds: default_tail_bounds(),
            tail_penalties: default_tail_penalties(),
            tail_penalty_max: default_tail_penalty_max(),
        }
    }
}

impl ResolverConfig {
    /// Base weight of a tier before modifiers.
    pub fn tier_weight(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Structure => self.structure_weight,
            Tier::Tactical => self.tactical_weight,
            Tier::Timing => self.timing_weight,
        }
    }

    /// Step-function tail penalty for an `mc_p95_dd` estimate.
    pub fn tail_penalty(&self, mc_p95_dd: f64) -> f64 {
        for (bound, penalty) in self.tail_bounds.iter().zip(self.tail_penalties.iter()) {
            if mc_p95_dd < *bound {
                return *penalty;
            }
        }
        self.tail_penalty_max
    }
}
