//! Bias and timing aggregation stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::{Horizon, Tier};

use crate::config::ResolverConfig;
use crate::types::{DivergenceGrade, HorizonInput, MacroFlag};

/// Bias direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiasDirection {
    Bull,
    Bear,
    Neutral,
}

impl BiasDirection {
    pub fn sign(&self) -> i8 {
        match self {
            Self::Bull => 1,
            Self::Bear => -1,
            Self::Neutral => 0,
        }
    }
}

impl fmt::Display for BiasDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bull => write!(f, "BULL"),
            Self::Bear => write!(f, "BEAR"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Timing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimingAction {
    Enter,
    Wait,
    Exit,
}

impl TimingAction {
    pub fn sign(&self) -> i8 {
        match self {
            Self::Enter => 1,
            Self::Wait => 0,
            Self::Exit => -1,
        }
    }
}

impl fmt::Display for TimingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => write!(f, "ENTER"),
            Self::Wait => write!(f, "WAIT"),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}

/// One horizon's contribution to a stage score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonContribution {
    pub horizon: Horizon,
    /// Renormalized weight used for this horizon.
    pub weight: f64,
    /// `weight · signedEdge · confidence · reliability · (1 − phaseRisk)`.
    pub contribution: f64,
}

/// Bias stage result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasResolution {
    pub direction: BiasDirection,
    pub score: f64,
    /// `min(|score|, 1)`.
    pub strength: f64,
    /// Horizon with the largest absolute contribution; ties resolve to the
    /// earlier horizon in canonical order.
    pub dominant_horizon: Option<Horizon>,
    pub contributions: Vec<HorizonContribution>,
    /// Weight-averaged input confidence; the base for the no-inflation
    /// confidence invariant downstream.
    pub weighted_confidence: f64,
}

/// Timing stage result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingResolution {
    pub action: TimingAction,
    pub score: f64,
    pub strength: f64,
    pub dominant_horizon: Option<Horizon>,
    pub contributions: Vec<HorizonContribution>,
    /// Blockers propagated verbatim from the contributing horizons.
    pub blockers: Vec<String>,
}

/// Tier weight after macro-flag modifiers.
fn effective_tier_weight(tier: Tier, config: &ResolverConfig, flags: &[MacroFlag]) -> f64 {
    let mut weight = config.tier_weight(tier);
    if flags.contains(&MacroFlag::VolShock) {
        match tier {
            Tier::Structure => weight *= config.vol_shock_structure_boost,
            Tier::Timing => weight *= config.vol_shock_timing_cut,
            Tier::Tactical => {}
        }
    }
    if flags.contains(&MacroFlag::BearDrawdown) && tier == Tier::Structure {
        weight *= config.bear_structure_boost;
    }
    weight
}

/// Aggregate a horizon subset into contributions with renormalized weights.
///
/// Each present horizon gets its tier's effective weight split evenly among
/// the present horizons of that tier, then the weights are renormalized to
/// sum to 1. Horizons are processed in canonical order for determinism.
fn aggregate(
    inputs: &[HorizonInput],
    config: &ResolverConfig,
    flags: &[MacroFlag],
) -> (Vec<HorizonContribution>, f64) {
    let mut sorted: Vec<&HorizonInput> = inputs.iter().collect();
    sorted.sort_by_key(|i| i.horizon.canonical_index());

    let mut tier_counts = [0usize; 3];
    for input in &sorted {
        tier_counts[tier_slot(input.horizon.tier())] += 1;
    }

    let mut raw_weights: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut weight_sum = 0.0_f64;
    for input in &sorted {
        let tier = input.horizon.tier();
        let per_horizon =
            effective_tier_weight(tier, config, flags) / tier_counts[tier_slot(tier)] as f64;
        raw_weights.push(per_horizon);
        weight_sum += per_horizon;
    }

    let mut contributions = Vec::with_capacity(sorted.len());
    let mut weighted_confidence = 0.0_f64;
    for (input, raw) in sorted.iter().zip(raw_weights.iter()) {
        let weight = if weight_sum > 0.0 { raw / weight_sum } else { 0.0 };
        let contribution = weight
            * input.signed_edge
            * input.confidence
            * input.reliability
            * (1.0 - input.phase_risk);
        weighted_confidence += weight * input.confidence;
        contributions.push(HorizonContribution {
            horizon: input.horizon,
            weight,
            contribution,
        });
    }

    (contributions, weighted_confidence)
}

fn tier_slot(tier: Tier) -> usize {
    match tier {
        Tier::Timing => 0,
        Tier::Tactical => 1,
        Tier::Structure => 2,
    }
}

/// Dominant horizon: largest `|contribution|`, first-in-canonical-order on
/// ties (strict greater-than while scanning in order).
fn dominant(contributions: &[HorizonContribution]) -> Option<Horizon> {
    let mut best: Option<(Horizon, f64)> = None;
    for c in contributions {
        let abs = c.contribution.abs();
        match best {
            Some((_, best_abs)) if abs <= best_abs => {}
            _ => best = Some((c.horizon, abs)),
        }
    }
    best.map(|(h, _)| h)
}

/// Bias stage over all supplied horizons, STRUCTURE dominant by weight.
pub fn compute_bias(
    inputs: &[HorizonInput],
    config: &ResolverConfig,
    flags: &[MacroFlag],
    grade: DivergenceGrade,
) -> BiasResolution {
    let (contributions, weighted_confidence) = aggregate(inputs, config, flags);
    let raw_score: f64 = contributions.iter().map(|c| c.contribution).sum();
    let score = raw_score * grade.multiplier();

    // Strictly greater-than: a score exactly at the threshold is NEUTRAL.
    let direction = if score > config.bias_threshold {
        BiasDirection::Bull
    } else if score < -config.bias_threshold {
        BiasDirection::Bear
    } else {
        BiasDirection::Neutral
    };

    BiasResolution {
        direction,
        score,
        strength: score.abs().min(1.0),
        dominant_horizon: dominant(&contributions),
        contributions,
        weighted_confidence,
    }
}

/// Timing stage over TIMING + TACTICAL horizons, same formula.
pub fn compute_timing(
    inputs: &[HorizonInput],
    config: &ResolverConfig,
    flags: &[MacroFlag],
    grade: DivergenceGrade,
) -> TimingResolution {
    let subset: Vec<HorizonInput> = inputs
        .iter()
        .filter(|i| matches!(i.horizon.tier(), Tier::Timing | Tier::Tactical))
        .cloned()
        .collect();

    let (contributions, _) = aggregate(&subset, config, flags);
    let raw_score: f64 = contributions.iter().map(|c| c.contribution).sum();
    let score = raw_score * grade.multiplier();

    let action = if score > config.timing_threshold {
        TimingAction::Enter
    } else if score < -config.timing_threshold {
        TimingAction::Exit
    } else {
        TimingAction::Wait
    };

    let mut blockers = Vec::new();
    let mut ordered = subset;
    ordered.sort_by_key(|i| i.horizon.canonical_index());
    for input in &ordered {
        blockers.extend(input.blockers.iter().cloned());
    }

    TimingResolution {
        action,
        score,
        strength: score.abs().min(1.0),
        dominant_horizon: dominant(&contributions),
        contributions,
        blockers,
    }
}
