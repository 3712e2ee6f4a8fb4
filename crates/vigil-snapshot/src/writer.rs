//! Snapshot construction and persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vigil_core::{
    snapshot_fingerprint, Evaluation, ForecastSnapshot, ModelOutput, Price, Symbol,
};
use vigil_store::SnapshotStore;

use crate::error::{SnapshotError, SnapshotResult};

/// Outcome of writing a bundle of model outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    /// Snapshots newly inserted.
    pub written: usize,
    /// Attempts that collided with an existing fingerprint.
    pub skipped_duplicate: usize,
    /// Outputs rejected at the input boundary.
    pub invalid: usize,
}

/// Snapshot writer for one policy configuration.
///
/// The policy hash participates in every fingerprint, so two writers with
/// different policies never collide even on the same (symbol, horizon,
/// preset, role, day) tuple.
pub struct SnapshotWriter {
    store: Arc<dyn SnapshotStore>,
    policy_hash: String,
    engine_version: String,
}

impl SnapshotWriter {
    pub fn new(store: Arc<dyn SnapshotStore>, policy_hash: &str, engine_version: &str) -> Self {
        Self {
            store,
            policy_hash: policy_hash.to_string(),
            engine_version: engine_version.to_string(),
        }
    }

    pub fn policy_hash(&self) -> &str {
        &self.policy_hash
    }

    /// Build and persist one snapshot.
    ///
    /// Returns whether the record was newly inserted. Input violations
    /// abort before persistence; store errors bubble up so the caller can
    /// re-enqueue the attempt unchanged.
    pub fn write_one(
        &self,
        symbol: &Symbol,
        output: &ModelOutput,
        as_of: DateTime<Utc>,
    ) -> SnapshotResult<bool> {
        output.validate()?;

        let snapshot = self.build(symbol, output, as_of)?;
        let receipt = self.store.put(snapshot)?;

        Ok(receipt.inserted)
    }

    /// Write a full bundle for a symbol, isolating per-output failures.
    ///
    /// Invalid outputs are counted and logged, never persisted; they must
    /// not abort the rest of the bundle.
    pub fn write_bundle(
        &self,
        symbol: &Symbol,
        outputs: &[ModelOutput],
        as_of: DateTime<Utc>,
    ) -> SnapshotResult<WriteReport> {
        let mut report = WriteReport::default();

        for output in outputs {
            match self.write_one(symbol, output, as_of) {
                Ok(true) => report.written += 1,
                Ok(false) => report.skipped_duplicate += 1,
                Err(SnapshotError::InvalidSnapshotInput(reason)) => {
                    warn!(
                        %symbol,
                        horizon = %output.horizon,
                        reason,
                        "model output rejected"
                    );
                    report.invalid += 1;
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            %symbol,
            written = report.written,
            skipped = report.skipped_duplicate,
            invalid = report.invalid,
            "snapshot bundle written"
        );
        Ok(report)
    }

    fn build(
        &self,
        symbol: &Symbol,
        output: &ModelOutput,
        as_of: DateTime<Utc>,
    ) -> SnapshotResult<ForecastSnapshot> {
        let resolve_at = as_of + output.horizon.duration();

        let growth = Decimal::from_f64(1.0 + output.expected_move_pct).ok_or_else(|| {
            SnapshotError::InvalidSnapshotInput(format!(
                "expected_move_pct not representable: {}",
                output.expected_move_pct
            ))
        })?;
        let target_price = Price::new(output.current_price.inner() * growth);

        let fingerprint = snapshot_fingerprint(
            symbol,
            output.horizon,
            output.preset,
            output.role,
            as_of,
            &self.policy_hash,
        );

        Ok(ForecastSnapshot {
            fingerprint,
            symbol: symbol.clone(),
            horizon: output.horizon,
            preset: output.preset,
            role: output.role,
            policy_hash: self.policy_hash.clone(),
            engine_version: self.engine_version.clone(),
            created_at: as_of,
            resolve_at,
            start_price: output.current_price,
            target_price,
            expected_move_pct: output.expected_move_pct,
            direction: output.direction,
            confidence: output.confidence,
            evaluation: Evaluation::pending(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use vigil_core::{Direction, Horizon, Preset, Role};
    use vigil_store::{MemorySnapshotStore, SnapshotFilter};

    fn btc() -> Symbol {
        Symbol::new("BTC").unwrap()
    }

    fn output() -> ModelOutput {
        ModelOutput {
            horizon: Horizon::D7,
            preset: Preset::Balanced,
            role: Role::Active,
            direction: Direction::Up,
            confidence: 0.72,
            expected_move_pct: 0.018,
            current_price: Price::new(dec!(68000)),
        }
    }

    fn writer(store: Arc<MemorySnapshotStore>) -> SnapshotWriter {
        SnapshotWriter::new(store, "policy-1", "engine-v1")
    }

    #[test]
    fn test_write_one_computes_frozen_fields() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer = writer(store.clone());
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert!(writer.write_one(&btc(), &output(), as_of).unwrap());

        let snapshots = store.list(&SnapshotFilter::default(), 10).unwrap();
        assert_eq!(snapshots.len(), 1);
        let snap = &snapshots[0];
        assert_eq!(snap.resolve_at, Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap());
        assert_eq!(snap.target_price, Price::new(dec!(69224.000)));
        assert_eq!(snap.start_price, Price::new(dec!(68000)));
        assert_eq!(snap.direction, Direction::Up);
        assert!(snap.resolve_at > snap.created_at);
    }

    #[test]
    fn test_repeat_writes_dedupe_exactly_once() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer = writer(store.clone());
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert!(writer.write_one(&btc(), &output(), as_of).unwrap());
        assert!(!writer.write_one(&btc(), &output(), as_of).unwrap());
        assert!(!writer.write_one(&btc(), &output(), as_of).unwrap());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_same_day_different_hour_still_dedupes() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer = writer(store.clone());

        let morning = Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 6, 1, 22, 0, 0).unwrap();
        assert!(writer.write_one(&btc(), &output(), morning).unwrap());
        assert!(!writer.write_one(&btc(), &output(), evening).unwrap());
    }

    #[test]
    fn test_different_policy_hash_writes_both() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer_a = SnapshotWriter::new(store.clone(), "policy-1", "engine-v1");
        let writer_b = SnapshotWriter::new(store.clone(), "policy-2", "engine-v1");
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert!(writer_a.write_one(&btc(), &output(), as_of).unwrap());
        assert!(writer_b.write_one(&btc(), &output(), as_of).unwrap());
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_invalid_confidence_aborts_before_persistence() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer = writer(store.clone());
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut bad = output();
        bad.confidence = 1.5;
        let err = writer.write_one(&btc(), &bad, as_of).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidSnapshotInput(_)));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_bundle_isolates_invalid_outputs() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer = writer(store.clone());
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut bad = output();
        bad.horizon = Horizon::D30;
        bad.confidence = f64::NAN;
        let mut other = output();
        other.horizon = Horizon::D90;

        let report = writer
            .write_bundle(&btc(), &[output(), bad, other], as_of)
            .unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.skipped_duplicate, 0);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_downward_forecast_target_below_start() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer = writer(store.clone());
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut down = output();
        down.direction = Direction::Down;
        down.expected_move_pct = -0.025;
        writer.write_one(&btc(), &down, as_of).unwrap();

        let snap = &store.list(&SnapshotFilter::default(), 1).unwrap()[0];
        assert_eq!(snap.target_price, Price::new(dec!(66300.000)));
    }

    #[test]
    fn test_resolve_at_spans_whole_days() {
        let store = Arc::new(MemorySnapshotStore::new());
        let writer = writer(store.clone());
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();

        let mut long = output();
        long.horizon = Horizon::D365;
        writer.write_one(&btc(), &long, as_of).unwrap();

        let snap = &store.list(&SnapshotFilter::default(), 1).unwrap()[0];
        assert_eq!(snap.resolve_at - snap.created_at, Duration::days(365));
    }
}
