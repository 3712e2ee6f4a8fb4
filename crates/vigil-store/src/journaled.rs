//! Journaling store decorators.
//!
//! Wrap any snapshot/outcome store and append every newly inserted record
//! (and every resolution) to a JSON Lines journal. The journal is a pure
//! audit trail: reads and idempotence checks always go to the inner store.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use vigil_core::{ForecastOutcome, ForecastSnapshot, ResolvedFields};

use crate::error::StoreResult;
use crate::journal::JsonLinesJournal;
use crate::outcome::{OutcomeFilter, OutcomeStore};
use crate::snapshot::{PutReceipt, SnapshotFilter, SnapshotStore};

/// Snapshot store wrapper journaling inserts and resolutions.
pub struct JournaledSnapshotStore<S: SnapshotStore> {
    inner: S,
    journal: Mutex<JsonLinesJournal<ForecastSnapshot>>,
}

impl<S: SnapshotStore> JournaledSnapshotStore<S> {
    pub fn new(inner: S, base_dir: &str) -> Self {
        Self {
            inner,
            journal: Mutex::new(JsonLinesJournal::new(base_dir, "snapshots", 64)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SnapshotStore> SnapshotStore for JournaledSnapshotStore<S> {
    fn put(&self, snapshot: ForecastSnapshot) -> StoreResult<PutReceipt> {
        let record = snapshot.clone();
        let receipt = self.inner.put(snapshot)?;
        if receipt.inserted {
            let mut journal = self.journal.lock();
            journal.append(record)?;
            journal.flush()?;
        }
        Ok(receipt)
    }

    fn get(&self, fingerprint: &str) -> StoreResult<Option<ForecastSnapshot>> {
        self.inner.get(fingerprint)
    }

    fn list_pending(&self, as_of: DateTime<Utc>, limit: usize) -> StoreResult<Vec<ForecastSnapshot>> {
        self.inner.list_pending(as_of, limit)
    }

    fn resolve(&self, fingerprint: &str, fields: &ResolvedFields) -> StoreResult<ForecastSnapshot> {
        let resolved = self.inner.resolve(fingerprint, fields)?;
        let mut journal = self.journal.lock();
        journal.append(resolved.clone())?;
        journal.flush()?;
        Ok(resolved)
    }

    fn list(&self, filter: &SnapshotFilter, limit: usize) -> StoreResult<Vec<ForecastSnapshot>> {
        self.inner.list(filter, limit)
    }

    fn count(&self) -> usize {
        self.inner.count()
    }
}

/// Outcome store wrapper journaling inserts.
pub struct JournaledOutcomeStore<S: OutcomeStore> {
    inner: S,
    journal: Mutex<JsonLinesJournal<ForecastOutcome>>,
}

impl<S: OutcomeStore> JournaledOutcomeStore<S> {
    pub fn new(inner: S, base_dir: &str) -> Self {
        Self {
            inner,
            journal: Mutex::new(JsonLinesJournal::new(base_dir, "outcomes", 64)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: OutcomeStore> OutcomeStore for JournaledOutcomeStore<S> {
    fn put(&self, outcome: ForecastOutcome) -> StoreResult<PutReceipt> {
        let record = outcome.clone();
        let receipt = self.inner.put(outcome)?;
        if receipt.inserted {
            let mut journal = self.journal.lock();
            journal.append(record)?;
            journal.flush()?;
        }
        Ok(receipt)
    }

    fn get(&self, snapshot_ref: &str) -> StoreResult<Option<ForecastOutcome>> {
        self.inner.get(snapshot_ref)
    }

    fn query(&self, filter: &OutcomeFilter, window: usize) -> StoreResult<Vec<ForecastOutcome>> {
        self.inner.query(filter, window)
    }

    fn distinct_symbols(&self) -> StoreResult<Vec<vigil_core::Symbol>> {
        self.inner.distinct_symbols()
    }

    fn count(&self, filter: &OutcomeFilter) -> StoreResult<usize> {
        self.inner.count(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::MemoryOutcomeStore;
    use crate::snapshot::MemorySnapshotStore;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;
    use vigil_core::{
        Direction, Evaluation, ForecastResult, Horizon, Preset, Price, Role, Symbol,
    };

    fn snapshot(fp: &str) -> ForecastSnapshot {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        ForecastSnapshot {
            fingerprint: fp.to_string(),
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
            direction: Direction::Up,
            confidence: 0.72,
            evaluation: Evaluation::pending(),
        }
    }

    fn journal_lines(dir: &TempDir, prefix: &str) -> usize {
        std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
            .map(|e| {
                std::fs::read_to_string(e.path())
                    .unwrap()
                    .lines()
                    .count()
            })
            .sum()
    }

    #[test]
    fn test_inserts_and_resolutions_are_journaled() {
        let dir = TempDir::new().unwrap();
        let store =
            JournaledSnapshotStore::new(MemorySnapshotStore::new(), dir.path().to_str().unwrap());

        store.put(snapshot("a")).unwrap();
        // Duplicate put journals nothing.
        store.put(snapshot("a")).unwrap();
        assert_eq!(journal_lines(&dir, "snapshots"), 1);

        store
            .resolve(
                "a",
                &ResolvedFields {
                    real_price: Price::new(dec!(70000)),
                    result: ForecastResult::Win,
                    deviation: 0.0114,
                    resolved_at: Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap(),
                },
            )
            .unwrap();
        assert_eq!(journal_lines(&dir, "snapshots"), 2);
    }

    #[test]
    fn test_outcome_journal_only_on_insert() {
        let dir = TempDir::new().unwrap();
        let store =
            JournaledOutcomeStore::new(MemoryOutcomeStore::new(), dir.path().to_str().unwrap());

        let resolved = snapshot("a").with_resolution(&ResolvedFields {
            real_price: Price::new(dec!(70000)),
            result: ForecastResult::Win,
            deviation: 0.0114,
            resolved_at: Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap(),
        });
        let outcome = ForecastOutcome::from_snapshot(&resolved).unwrap();

        store.put(outcome.clone()).unwrap();
        store.put(outcome).unwrap();
        assert_eq!(journal_lines(&dir, "outcomes"), 1);
    }
}
