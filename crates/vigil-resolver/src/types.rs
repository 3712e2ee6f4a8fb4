//! Resolver input and output types.
//!
//! Inputs are canonical and bounded: macro context arrives as a closed flag
//! set, grades come from a fixed ladder, and external multipliers are
//! clamped to 1.0 before use. Raw, open-ended payloads never reach the
//! resolver.

use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::{GovernanceMode, Horizon, Role};

use crate::error::{ResolverError, ResolverResult};
use crate::stages::{BiasResolution, TimingResolution};

/// Per-horizon signal input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonInput {
    pub horizon: Horizon,
    /// Signed edge in [-1, 1]; positive is bullish.
    pub signed_edge: f64,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    /// Historical reliability of this horizon's signals in [0, 1].
    pub reliability: f64,
    /// Phase risk discount in [0, 1]; 1 means the phase fully distrusts
    /// this horizon.
    pub phase_risk: f64,
    /// Blockers raised by the horizon's own guards; propagated verbatim
    /// into the timing result.
    #[serde(default)]
    pub blockers: Vec<String>,
}

impl HorizonInput {
    fn check_unit(field: &'static str, value: f64) -> ResolverResult<()> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ResolverError::OutOfBounds { field, value });
        }
        Ok(())
    }

    /// Validate bounds.
    pub fn validate(&self) -> ResolverResult<()> {
        if !self.signed_edge.is_finite() || !(-1.0..=1.0).contains(&self.signed_edge) {
            return Err(ResolverError::OutOfBounds {
                field: "signed_edge",
                value: self.signed_edge,
            });
        }
        Self::check_unit("confidence", self.confidence)?;
        Self::check_unit("reliability", self.reliability)?;
        Self::check_unit("phase_risk", self.phase_risk)?;
        Ok(())
    }
}

/// Closed macro-context flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MacroFlag {
    /// Volatility shock: boosts STRUCTURE, cuts TIMING.
    VolShock,
    /// Bear-market drawdown: boosts STRUCTURE.
    BearDrawdown,
}

/// Cross-horizon divergence grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceGrade {
    A,
    B,
    C,
    D,
    F,
}

impl DivergenceGrade {
    /// Score multiplier for the grade. A mild boost for clean agreement,
    /// progressively heavier penalties as horizons diverge.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::A => 1.05,
            Self::B => 1.00,
            Self::C => 0.95,
            Self::D => 0.85,
            Self::F => 0.70,
        }
    }
}

impl fmt::Display for DivergenceGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
            Self::D => write!(f, "D"),
            Self::F => write!(f, "F"),
        }
    }
}

/// Tail risk statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TailStats {
    /// Monte-Carlo P95 drawdown estimate.
    pub mc_p95_dd: f64,
    /// Walk-forward maximum drawdown.
    pub max_dd_wf: f64,
}

/// Externally supplied size modifier.
///
/// Factors above 1.0 are clamped to 1.0 before use; no external source may
/// inflate the size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalModifier {
    pub name: String,
    pub factor: f64,
}

impl ExternalModifier {
    /// The factor, clamped into [0, 1].
    pub fn clamped(&self) -> f64 {
        self.factor.clamp(0.0, 1.0)
    }
}

/// Governance directive consulted by the final stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDirective {
    pub mode: GovernanceMode,
    /// Policy hash frozen when the mode entered FROZEN_ONLY.
    pub frozen_policy_hash: Option<String>,
}

impl GovernanceDirective {
    pub fn normal() -> Self {
        Self {
            mode: GovernanceMode::Normal,
            frozen_policy_hash: None,
        }
    }
}

/// Full resolver input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverInput {
    pub horizons: Vec<HorizonInput>,
    /// Signal entropy in [0, 1]; 1 means pure noise.
    pub entropy: f64,
    pub tail: TailStats,
    #[serde(default)]
    pub flags: Vec<MacroFlag>,
    pub divergence_grade: DivergenceGrade,
    #[serde(default)]
    pub external_modifiers: Vec<ExternalModifier>,
    pub governance: GovernanceDirective,
    /// Role of the decision consumer; SHADOW never passes FROZEN_ONLY.
    pub role: Role,
    /// Policy hash of the configuration asking for the decision.
    pub policy_hash: String,
}

impl ResolverInput {
    /// Validate the whole bundle.
    pub fn validate(&self) -> ResolverResult<()> {
        if self.horizons.is_empty() {
            return Err(ResolverError::NoHorizons);
        }
        let mut seen = std::collections::BTreeSet::new();
        for input in &self.horizons {
            input.validate()?;
            if !seen.insert(input.horizon) {
                return Err(ResolverError::DuplicateHorizon(input.horizon.to_string()));
            }
        }
        if !self.entropy.is_finite() || !(0.0..=1.0).contains(&self.entropy) {
            return Err(ResolverError::OutOfBounds {
                field: "entropy",
                value: self.entropy,
            });
        }
        if !self.tail.mc_p95_dd.is_finite() || self.tail.mc_p95_dd < 0.0 {
            return Err(ResolverError::OutOfBounds {
                field: "mc_p95_dd",
                value: self.tail.mc_p95_dd,
            });
        }
        Ok(())
    }
}

/// Final decision mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionMode {
    TrendFollow,
    CounterTrend,
    Hold,
}

impl fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrendFollow => write!(f, "TREND_FOLLOW"),
            Self::CounterTrend => write!(f, "COUNTER_TREND"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Final action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalAction {
    Buy,
    Sell,
    Hold,
    /// Terminal: once a decision resolves to AVOID no later stage may turn
    /// it back into BUY/SELL.
    Avoid,
}

impl fmt::Display for FinalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
            Self::Avoid => write!(f, "AVOID"),
        }
    }
}

/// Resolved decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDecision {
    pub bias: BiasResolution,
    pub timing: TimingResolution,
    pub mode: DecisionMode,
    pub action: FinalAction,
    /// Size multiplier in [0, 1].
    pub size_multiplier: f64,
    /// Weighted mean of horizon confidences before any stage discounts.
    pub base_confidence: f64,
    /// Never exceeds `base_confidence`.
    pub final_confidence: f64,
    /// Human-readable reason trail, one entry per stage decision.
    pub explain: Vec<String>,
}
