//! Statistics input samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::{ForecastOutcome, ForecastResult};

/// The slice of an outcome that statistics consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSample {
    pub result: ForecastResult,
    /// Direction-aligned realized return.
    pub realized_return: f64,
    /// Confidence frozen at snapshot creation.
    pub confidence: f64,
    pub resolved_at: DateTime<Utc>,
}

impl OutcomeSample {
    pub fn is_win(&self) -> bool {
        self.result == ForecastResult::Win
    }

    pub fn is_loss(&self) -> bool {
        self.result == ForecastResult::Loss
    }

    /// Whether the outcome was decided (non-DRAW).
    pub fn is_decided(&self) -> bool {
        self.result != ForecastResult::Draw
    }
}

impl From<&ForecastOutcome> for OutcomeSample {
    fn from(outcome: &ForecastOutcome) -> Self {
        Self {
            result: outcome.result,
            realized_return: outcome.realized_return,
            confidence: outcome.confidence,
            resolved_at: outcome.resolved_at,
        }
    }
}
