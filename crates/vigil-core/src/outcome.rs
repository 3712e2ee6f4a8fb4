//! Forecast outcome records.

use crate::{
    CohortKey, Direction, ForecastResult, ForecastSnapshot, Horizon, Preset, Price, Role, Symbol,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One-to-one companion of a RESOLVED snapshot.
///
/// Denormalizes the cohort fields so statistics queries never have to join
/// back to the snapshot store. References the snapshot by fingerprint value,
/// never by live pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    /// Fingerprint of the resolved snapshot.
    pub snapshot_ref: String,
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub preset: Preset,
    pub role: Role,
    /// Policy hash carried over for post-hoc attribution.
    pub policy_hash: String,
    pub start_price: Price,
    pub target_price: Price,
    pub real_price: Price,
    pub result: ForecastResult,
    pub direction_correct: bool,
    /// `|realPrice − targetPrice| / startPrice`.
    pub deviation: f64,
    /// Signed fractional move `(realPrice − startPrice) / startPrice`.
    pub realized_move_pct: f64,
    /// Return earned by following the forecast direction: the realized move
    /// aligned with the forecast sign (a FLAT forecast earns minus the
    /// absolute move).
    pub realized_return: f64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub resolved_at: DateTime<Utc>,
}

impl ForecastOutcome {
    /// Build the outcome from a RESOLVED snapshot's own fields.
    ///
    /// Returns `None` while the snapshot is still PENDING. This is the
    /// repair path for a resolve that succeeded but whose outcome write
    /// failed: the next tracker run re-derives the outcome from here.
    pub fn from_snapshot(snapshot: &ForecastSnapshot) -> Option<Self> {
        let eval = &snapshot.evaluation;
        if !eval.is_resolved() {
            return None;
        }
        let real_price = eval.real_price?;
        let result = eval.result?;
        let deviation = eval.deviation?;
        let resolved_at = eval.resolved_at?;

        let realized_move_pct = real_price.move_from(snapshot.start_price).unwrap_or(0.0);
        let direction_correct = match snapshot.direction {
            Direction::Up => realized_move_pct > 0.0,
            Direction::Down => realized_move_pct < 0.0,
            Direction::Flat => result == ForecastResult::Draw,
        };
        let realized_return = match snapshot.direction {
            Direction::Up => realized_move_pct,
            Direction::Down => -realized_move_pct,
            Direction::Flat => -realized_move_pct.abs(),
        };

        Some(Self {
            snapshot_ref: snapshot.fingerprint.clone(),
            symbol: snapshot.symbol.clone(),
            horizon: snapshot.horizon,
            preset: snapshot.preset,
            role: snapshot.role,
            policy_hash: snapshot.policy_hash.clone(),
            start_price: snapshot.start_price,
            target_price: snapshot.target_price,
            real_price,
            result,
            direction_correct,
            deviation,
            realized_move_pct,
            realized_return,
            confidence: snapshot.confidence,
            created_at: snapshot.created_at,
            resolved_at,
        })
    }

    /// Cohort this outcome belongs to.
    pub fn cohort(&self) -> CohortKey {
        CohortKey::new(self.symbol.clone(), self.horizon, self.preset, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Evaluation, ResolvedFields};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn resolved_snapshot(direction: Direction, real: rust_decimal::Decimal) -> ForecastSnapshot {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let snap = ForecastSnapshot {
            fingerprint: "fp".to_string(),
            symbol: Symbol::new("BTC").unwrap(),
            horizon: Horizon::D7,
            preset: Preset::Balanced,
            role: Role::Active,
            policy_hash: "p1".to_string(),
            engine_version: "v1".to_string(),
            created_at: t0,
            resolve_at: t0 + Duration::days(7),
            start_price: Price::new(dec!(68000)),
            target_price: Price::new(dec!(69224)),
            expected_move_pct: 0.018,
            direction,
            confidence: 0.72,
            evaluation: Evaluation::pending(),
        };
        let result = if real > dec!(68000) {
            ForecastResult::Win
        } else {
            ForecastResult::Loss
        };
        snap.with_resolution(&ResolvedFields {
            real_price: Price::new(real),
            result,
            deviation: 0.0114,
            resolved_at: t0 + Duration::days(7),
        })
    }

    #[test]
    fn test_from_pending_is_none() {
        let mut snap = resolved_snapshot(Direction::Up, dec!(70000));
        snap.evaluation = Evaluation::pending();
        assert!(ForecastOutcome::from_snapshot(&snap).is_none());
    }

    #[test]
    fn test_from_resolved_populates_derived_fields() {
        let snap = resolved_snapshot(Direction::Up, dec!(70000));
        let outcome = ForecastOutcome::from_snapshot(&snap).unwrap();
        assert_eq!(outcome.snapshot_ref, "fp");
        assert_eq!(outcome.result, ForecastResult::Win);
        assert!(outcome.direction_correct);
        assert!((outcome.realized_move_pct - 0.029411).abs() < 1e-5);
        assert!((outcome.realized_return - 0.029411).abs() < 1e-5);
    }

    #[test]
    fn test_down_forecast_aligned_return() {
        let snap = resolved_snapshot(Direction::Down, dec!(66000));
        let outcome = ForecastOutcome::from_snapshot(&snap).unwrap();
        assert!(outcome.direction_correct);
        assert!(outcome.realized_move_pct < 0.0);
        assert!(outcome.realized_return > 0.0);
    }
}
