//! Outcome store: append-only arena keyed by snapshot reference.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use tracing::{debug, trace};
use vigil_core::{CohortKey, ForecastOutcome, ForecastResult, Horizon, Preset, Role, Symbol};

use crate::error::StoreResult;
use crate::snapshot::PutReceipt;

/// Read-query filter for outcomes. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct OutcomeFilter {
    pub symbol: Option<Symbol>,
    pub horizon: Option<Horizon>,
    pub preset: Option<Preset>,
    pub role: Option<Role>,
    pub result: Option<ForecastResult>,
}

impl OutcomeFilter {
    /// Filter for exactly one cohort.
    pub fn cohort(key: &CohortKey) -> Self {
        Self {
            symbol: Some(key.symbol.clone()),
            horizon: Some(key.horizon),
            preset: Some(key.preset),
            role: Some(key.role),
            result: None,
        }
    }

    pub fn matches(&self, outcome: &ForecastOutcome) -> bool {
        self.symbol.as_ref().map_or(true, |s| *s == outcome.symbol)
            && self.horizon.map_or(true, |h| h == outcome.horizon)
            && self.preset.map_or(true, |p| p == outcome.preset)
            && self.role.map_or(true, |r| r == outcome.role)
            && self.result.map_or(true, |res| res == outcome.result)
    }
}

/// Outcome persistence contract.
///
/// Append-only: `put` is insert-if-absent by snapshot reference, and no
/// operation ever mutates or removes a written record. The tracker relies
/// on that idempotence when it re-runs `put` for a snapshot that resolved
/// on an earlier, partially failed run.
pub trait OutcomeStore: Send + Sync {
    /// Insert-if-absent by snapshot reference.
    fn put(&self, outcome: ForecastOutcome) -> StoreResult<PutReceipt>;

    /// Fetch one outcome by its snapshot reference.
    fn get(&self, snapshot_ref: &str) -> StoreResult<Option<ForecastOutcome>>;

    /// The most recent `window` outcomes matching the filter, returned in
    /// chronological `resolved_at` order. The persisted order is the source
    /// of truth for every statistic downstream.
    fn query(&self, filter: &OutcomeFilter, window: usize) -> StoreResult<Vec<ForecastOutcome>>;

    /// All symbols with at least one outcome (monitoring).
    fn distinct_symbols(&self) -> StoreResult<Vec<Symbol>>;

    /// Count of outcomes matching the filter (monitoring).
    fn count(&self, filter: &OutcomeFilter) -> StoreResult<usize>;
}

/// In-memory outcome arena.
#[derive(Default)]
pub struct MemoryOutcomeStore {
    records: DashMap<String, ForecastOutcome>,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutcomeStore for MemoryOutcomeStore {
    fn put(&self, outcome: ForecastOutcome) -> StoreResult<PutReceipt> {
        match self.records.entry(outcome.snapshot_ref.clone()) {
            Entry::Occupied(_) => {
                trace!(snapshot_ref = %outcome.snapshot_ref, "outcome put deduped");
                Ok(PutReceipt { inserted: false })
            }
            Entry::Vacant(slot) => {
                debug!(
                    snapshot_ref = %outcome.snapshot_ref,
                    cohort = %outcome.cohort(),
                    result = %outcome.result,
                    "outcome inserted"
                );
                slot.insert(outcome);
                Ok(PutReceipt { inserted: true })
            }
        }
    }

    fn get(&self, snapshot_ref: &str) -> StoreResult<Option<ForecastOutcome>> {
        Ok(self.records.get(snapshot_ref).map(|r| r.clone()))
    }

    fn query(&self, filter: &OutcomeFilter, window: usize) -> StoreResult<Vec<ForecastOutcome>> {
        let mut matched: Vec<ForecastOutcome> = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.clone())
            .collect();
        // Chronological by resolution time; fingerprint tie-break keeps the
        // order stable across processes.
        matched.sort_by(|a, b| {
            a.resolved_at
                .cmp(&b.resolved_at)
                .then_with(|| a.snapshot_ref.cmp(&b.snapshot_ref))
        });
        if matched.len() > window {
            matched.drain(..matched.len() - window);
        }
        Ok(matched)
    }

    fn distinct_symbols(&self) -> StoreResult<Vec<Symbol>> {
        let symbols: BTreeSet<Symbol> = self.records.iter().map(|r| r.symbol.clone()).collect();
        Ok(symbols.into_iter().collect())
    }

    fn count(&self, filter: &OutcomeFilter) -> StoreResult<usize> {
        Ok(self.records.iter().filter(|r| filter.matches(r)).count())
    }
}
