//! Forecast horizons and weighting tiers.
//!
//! Horizons form a finite set with fixed durations. They group into tiers
//! (TIMING shortest, STRUCTURE longest) which drive resolver weighting.
//! The canonical order is ascending duration; every deterministic tie-break
//! in the platform resolves to the earlier horizon in this order.

use crate::error::{CoreError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "7d")]
    D7,
    #[serde(rename = "14d")]
    D14,
    #[serde(rename = "30d")]
    D30,
    #[serde(rename = "90d")]
    D90,
    #[serde(rename = "180d")]
    D180,
    #[serde(rename = "365d")]
    D365,
}

/// Weighting tier a horizon belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Shortest horizons; dominates timing decisions.
    Timing,
    /// Mid-range horizons.
    Tactical,
    /// Longest horizons; dominates bias decisions.
    Structure,
}

impl Horizon {
    /// All horizons in canonical (ascending-duration) order.
    pub const ALL: [Horizon; 7] = [
        Horizon::D1,
        Horizon::D7,
        Horizon::D14,
        Horizon::D30,
        Horizon::D90,
        Horizon::D180,
        Horizon::D365,
    ];

    /// Horizon duration in whole days.
    pub fn days(&self) -> i64 {
        match self {
            Self::D1 => 1,
            Self::D7 => 7,
            Self::D14 => 14,
            Self::D30 => 30,
            Self::D90 => 90,
            Self::D180 => 180,
            Self::D365 => 365,
        }
    }

    /// Horizon duration as a chrono `Duration`.
    pub fn duration(&self) -> Duration {
        Duration::days(self.days())
    }

    /// Tier this horizon belongs to.
    pub fn tier(&self) -> Tier {
        match self {
            Self::D1 | Self::D7 | Self::D14 => Tier::Timing,
            Self::D30 | Self::D90 => Tier::Tactical,
            Self::D180 | Self::D365 => Tier::Structure,
        }
    }

    /// Canonical label (e.g. "7d").
    pub fn label(&self) -> &'static str {
        match self {
            Self::D1 => "1d",
            Self::D7 => "7d",
            Self::D14 => "14d",
            Self::D30 => "30d",
            Self::D90 => "90d",
            Self::D180 => "180d",
            Self::D365 => "365d",
        }
    }

    /// Position in the canonical order (for tie-breaks).
    pub fn canonical_index(&self) -> usize {
        Self::ALL.iter().position(|h| h == self).unwrap_or(usize::MAX)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Horizon {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|h| h.label() == normalized)
            .copied()
            .ok_or_else(|| CoreError::UnknownHorizon(s.to_string()))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timing => write!(f, "TIMING"),
            Self::Tactical => write!(f, "TACTICAL"),
            Self::Structure => write!(f, "STRUCTURE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_is_ascending() {
        let days: Vec<i64> = Horizon::ALL.iter().map(|h| h.days()).collect();
        let mut sorted = days.clone();
        sorted.sort_unstable();
        assert_eq!(days, sorted);
    }

    #[test]
    fn test_tier_mapping() {
        assert_eq!(Horizon::D7.tier(), Tier::Timing);
        assert_eq!(Horizon::D30.tier(), Tier::Tactical);
        assert_eq!(Horizon::D365.tier(), Tier::Structure);
    }

    #[test]
    fn test_parse_roundtrip() {
        for h in Horizon::ALL {
            assert_eq!(h.label().parse::<Horizon>().unwrap(), h);
        }
        assert!("2w".parse::<Horizon>().is_err());
    }

    #[test]
    fn test_serde_label() {
        let json = serde_json::to_string(&Horizon::D90).unwrap();
        assert_eq!(json, "\"90d\"");
        let back: Horizon = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Horizon::D90);
    }
}
