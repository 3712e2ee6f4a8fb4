//! Raw model output bundles.

use crate::error::{CoreError, Result};
use crate::{Direction, Horizon, Preset, Price, Role};
use serde::{Deserialize, Serialize};

/// Raw model output for one (horizon, preset, role) of a symbol.
///
/// This is the snapshot writer's input contract. Bounds are validated at the
/// boundary; nothing out of range ever reaches persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub horizon: Horizon,
    pub preset: Preset,
    pub role: Role,
    pub direction: Direction,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    /// Signed expected fractional move over the horizon.
    pub expected_move_pct: f64,
    /// Price at forecast time.
    pub current_price: Price,
}

impl ModelOutput {
    /// Validate bounds: confidence in [0, 1], finite signed move, positive
    /// finite price.
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(CoreError::ConfidenceOutOfBounds(self.confidence));
        }
        if !self.expected_move_pct.is_finite() {
            return Err(CoreError::NonFinitePrice(format!(
                "expected_move_pct = {}",
                self.expected_move_pct
            )));
        }
        if !self.current_price.is_positive() {
            return Err(CoreError::NonFinitePrice(format!(
                "current_price = {}",
                self.current_price
            )));
        }
        Ok(())
    }
}
