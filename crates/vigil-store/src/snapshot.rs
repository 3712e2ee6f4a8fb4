//! Snapshot store: append-only arena keyed by fingerprint.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};
use vigil_core::{
    EvaluationStatus, ForecastSnapshot, Horizon, Preset, ResolvedFields, Role, Symbol,
};

use crate::error::{StoreError, StoreResult};

/// Result of an insert-if-absent put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutReceipt {
    /// True if the record was newly inserted, false if it already existed.
    pub inserted: bool,
}

/// Read-query filter. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub symbol: Option<Symbol>,
    pub horizon: Option<Horizon>,
    pub preset: Option<Preset>,
    pub role: Option<Role>,
    pub status: Option<EvaluationStatus>,
}

impl SnapshotFilter {
    pub fn matches(&self, snapshot: &ForecastSnapshot) -> bool {
        self.symbol.as_ref().map_or(true, |s| *s == snapshot.symbol)
            && self.horizon.map_or(true, |h| h == snapshot.horizon)
            && self.preset.map_or(true, |p| p == snapshot.preset)
            && self.role.map_or(true, |r| r == snapshot.role)
            && self
                .status
                .map_or(true, |st| st == snapshot.evaluation.status)
    }
}

/// Snapshot persistence contract.
///
/// `put` is idempotent per fingerprint; `resolve` is a compare-and-set on
/// the evaluation status. No operation mutates the frozen creation fields.
pub trait SnapshotStore: Send + Sync {
    /// Insert-if-absent by fingerprint. Succeeds whether or not the record
    /// was already present.
    fn put(&self, snapshot: ForecastSnapshot) -> StoreResult<PutReceipt>;

    /// Fetch one snapshot by fingerprint.
    fn get(&self, fingerprint: &str) -> StoreResult<Option<ForecastSnapshot>>;

    /// PENDING snapshots with `resolve_at <= as_of`, ordered by `resolve_at`
    /// ascending, capped at `limit`.
    fn list_pending(&self, as_of: DateTime<Utc>, limit: usize) -> StoreResult<Vec<ForecastSnapshot>>;

    /// Atomically flip PENDING → RESOLVED and write the resolved fields.
    ///
    /// Fails with `AlreadyResolved` if another worker won the race, and
    /// `NotFound` for an unknown fingerprint. Returns the resolved record.
    fn resolve(&self, fingerprint: &str, fields: &ResolvedFields) -> StoreResult<ForecastSnapshot>;

    /// Filtered read-only listing, newest-first by `created_at`, capped at
    /// `min(limit, MAX_LIST_LIMIT)`.
    fn list(&self, filter: &SnapshotFilter, limit: usize) -> StoreResult<Vec<ForecastSnapshot>>;

    /// Total record count (monitoring).
    fn count(&self) -> usize;
}

/// Hard cap on read-query result size.
pub const MAX_LIST_LIMIT: usize = 500;

/// In-memory snapshot arena.
///
/// `DashMap` entries give per-key exclusive access, which makes `put` an
/// atomic insert-if-absent and `resolve` an atomic compare-and-set without
/// a global lock.
#[derive(Default)]
pub struct MemorySnapshotStore {
    records: DashMap<String, ForecastSnapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, snapshot: ForecastSnapshot) -> StoreResult<PutReceipt> {
        match self.records.entry(snapshot.fingerprint.clone()) {
            Entry::Occupied(_) => {
                trace!(fingerprint = %snapshot.fingerprint, "snapshot put deduped");
                Ok(PutReceipt { inserted: false })
            }
            Entry::Vacant(slot) => {
                debug!(
                    fingerprint = %snapshot.fingerprint,
                    cohort = %snapshot.cohort(),
                    resolve_at = %snapshot.resolve_at,
                    "snapshot inserted"
                );
                slot.insert(snapshot);
                Ok(PutReceipt { inserted: true })
            }
        }
    }

    fn get(&self, fingerprint: &str) -> StoreResult<Option<ForecastSnapshot>> {
        Ok(self.records.get(fingerprint).map(|r| r.clone()))
    }

    fn list_pending(&self, as_of: DateTime<Utc>, limit: usize) -> StoreResult<Vec<ForecastSnapshot>> {
        let mut due: Vec<ForecastSnapshot> = self
            .records
            .iter()
            .filter(|r| r.is_due(as_of))
            .map(|r| r.clone())
            .collect();
        due.sort_by(|a, b| {
            a.resolve_at
                .cmp(&b.resolve_at)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        due.truncate(limit);
        Ok(due)
    }

    fn resolve(&self, fingerprint: &str, fields: &ResolvedFields) -> StoreResult<ForecastSnapshot> {
        let mut entry = self
            .records
            .get_mut(fingerprint)
            .ok_or_else(|| StoreError::NotFound(fingerprint.to_string()))?;

        if entry.evaluation.is_resolved() {
            return Err(StoreError::AlreadyResolved(fingerprint.to_string()));
        }

        let resolved = entry.with_resolution(fields);
        *entry = resolved.clone();
        debug!(
            fingerprint,
            result = %fields.result,
            real_price = %fields.real_price,
            "snapshot resolved"
        );
        Ok(resolved)
    }

    fn list(&self, filter: &SnapshotFilter, limit: usize) -> StoreResult<Vec<ForecastSnapshot>> {
        let mut matched: Vec<ForecastSnapshot> = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.clone())
            .collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        matched.truncate(limit.min(MAX_LIST_LIMIT));
        Ok(matched)
    }

    fn count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use vigil_core::{Direction, Evaluation, ForecastResult, Price};

    fn snapshot(fp: &str, resolve_offset_days: i64) -> ForecastSnapshot {
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
            resolve_at: t0 + Duration::days(resolve_offset_days),
            start_price: Price::new(dec!(68000)),
            target_price: Price::new(dec!(69224)),
            expected_move_pct: 0.018,
            direction: Direction::Up,
            confidence: 0.72,
            evaluation: Evaluation::pending(),
        }
    }

    fn fields() -> ResolvedFields {
        ResolvedFields {
            real_price: Price::new(dec!(70000)),
            result: ForecastResult::Win,
            deviation: 0.0114,
            resolved_at: Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_put_is_insert_if_absent() {
        let store = MemorySnapshotStore::new();
        assert!(store.put(snapshot("a", 7)).unwrap().inserted);
        assert!(!store.put(snapshot("a", 7)).unwrap().inserted);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_list_pending_orders_by_resolve_at() {
        let store = MemorySnapshotStore::new();
        store.put(snapshot("late", 14)).unwrap();
        store.put(snapshot("early", 7)).unwrap();
        store.put(snapshot("future", 90)).unwrap();

        let as_of = Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap();
        let due = store.list_pending(as_of, 10).unwrap();
        let fps: Vec<&str> = due.iter().map(|s| s.fingerprint.as_str()).collect();
        assert_eq!(fps, vec!["early", "late"]);
    }

    #[test]
    fn test_resolve_is_compare_and_set() {
        let store = MemorySnapshotStore::new();
        store.put(snapshot("a", 7)).unwrap();

        let resolved = store.resolve("a", &fields()).unwrap();
        assert!(resolved.evaluation.is_resolved());

        let err = store.resolve("a", &fields()).unwrap_err();
        assert!(err.is_concurrency_loss());
    }

    #[test]
    fn test_resolve_unknown_fingerprint() {
        let store = MemorySnapshotStore::new();
        assert!(matches!(
            store.resolve("missing", &fields()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolved_snapshots_leave_pending_list() {
        let store = MemorySnapshotStore::new();
        store.put(snapshot("a", 7)).unwrap();
        store.resolve("a", &fields()).unwrap();

        let as_of = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        assert!(store.list_pending(as_of, 10).unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_and_caps() {
        let store = MemorySnapshotStore::new();
        store.put(snapshot("a", 7)).unwrap();
        store.put(snapshot("b", 14)).unwrap();
        store.resolve("a", &fields()).unwrap();

        let mut filter = SnapshotFilter::default();
        filter.status = Some(EvaluationStatus::Pending);
        let pending = store.list(&filter, 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fingerprint, "b");

        let capped = store.list(&SnapshotFilter::default(), 1).unwrap();
        assert_eq!(capped.len(), 1);
    }
}
