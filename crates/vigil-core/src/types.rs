//! Forecast classification enums and cohort keys.

use crate::{Horizon, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter preset a forecast was produced under.
///
/// Affects thresholds, sizing, and acceptance criteria but never the
/// algorithms themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Preset {
    Conservative,
    Balanced,
    Aggressive,
}

/// Whether a forecast participates in live decisions.
///
/// SHADOW outputs are recorded and evaluated but must never influence
/// live signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Active,
    Shadow,
}

/// Forecast direction, frozen at snapshot creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    /// Sign of the expected move: +1, -1, or 0.
    pub fn sign(&self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
            Self::Flat => 0,
        }
    }
}

/// Graded outcome of a resolved forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForecastResult {
    Win,
    Loss,
    Draw,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conservative => write!(f, "CONSERVATIVE"),
            Self::Balanced => write!(f, "BALANCED"),
            Self::Aggressive => write!(f, "AGGRESSIVE"),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Shadow => write!(f, "SHADOW"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Flat => write!(f, "FLAT"),
        }
    }
}

impl fmt::Display for ForecastResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Draw => write!(f, "DRAW"),
        }
    }
}

/// Governance mode for a symbol.
///
/// Ordering follows escalation severity: `Normal < Protection < FrozenOnly
/// < Halt`. The state machine in the governance crate only ever moves one
/// step down but may jump any number of steps up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceMode {
    Normal,
    Protection,
    FrozenOnly,
    Halt,
}

impl GovernanceMode {
    /// One step toward NORMAL; NORMAL stays put.
    pub fn step_down(&self) -> Self {
        match self {
            Self::Halt => Self::FrozenOnly,
            Self::FrozenOnly => Self::Protection,
            Self::Protection | Self::Normal => Self::Normal,
        }
    }
}

impl fmt::Display for GovernanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Protection => write!(f, "PROTECTION"),
            Self::FrozenOnly => write!(f, "FROZEN_ONLY"),
            Self::Halt => write!(f, "HALT"),
        }
    }
}

/// Key identifying a cohort of outcomes: (symbol, horizon, preset, role).
///
/// Cohorts are the unit of statistics, quality, and drift work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortKey {
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub preset: Preset,
    pub role: Role,
}

impl CohortKey {
    pub fn new(symbol: Symbol, horizon: Horizon, preset: Preset, role: Role) -> Self {
        Self {
            symbol,
            horizon,
            preset,
            role,
        }
    }
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.symbol, self.horizon, self.preset, self.role
        )
    }
}
