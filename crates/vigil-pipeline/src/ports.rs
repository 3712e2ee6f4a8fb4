//! Pipeline collaborator ports.
//!
//! The pipeline only orchestrates; model inference, data integrity, and
//! tail-risk estimation live behind these seams with narrow contracts.

use std::collections::HashMap;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use vigil_core::{ModelOutput, Symbol};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Source of raw model outputs. One call per symbol per pipeline run.
pub trait ModelOutputSource: Send + Sync {
    fn outputs_for(&self, symbol: &Symbol, as_of: DateTime<Utc>) -> BoxFuture<'_, Vec<ModelOutput>>;
}

/// Data-integrity prerequisite check, delegated to an external collaborator.
/// The pipeline only records the verdict; a failing symbol is excluded from
/// snapshot writing for the run.
pub trait IntegrityChecker: Send + Sync {
    fn check(&self, symbol: &Symbol) -> BoxFuture<'_, bool>;
}

/// Tail-risk estimates per symbol (Monte-Carlo P95 drawdown).
pub trait TailRiskSource: Send + Sync {
    fn mc_p95_dd(&self, symbol: &Symbol) -> f64;
}

/// Fixed-table model output source for tests and simulations.
#[derive(Default)]
pub struct FixedModelOutputSource {
    outputs: Mutex<HashMap<Symbol, Vec<ModelOutput>>>,
}

impl FixedModelOutputSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outputs(&self, symbol: Symbol, outputs: Vec<ModelOutput>) {
        self.outputs.lock().insert(symbol, outputs);
    }
}

impl ModelOutputSource for FixedModelOutputSource {
    fn outputs_for(&self, symbol: &Symbol, _as_of: DateTime<Utc>) -> BoxFuture<'_, Vec<ModelOutput>> {
        let outputs = self.outputs.lock().get(symbol).cloned().unwrap_or_default();
        Box::pin(async move { outputs })
    }
}

/// Integrity checker that accepts every symbol, with per-symbol overrides
/// for tests.
#[derive(Default)]
pub struct AlwaysOkIntegrity {
    failing: Mutex<Vec<Symbol>>,
}

impl AlwaysOkIntegrity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a symbol as failing its integrity prerequisites.
    pub fn fail_symbol(&self, symbol: Symbol) {
        self.failing.lock().push(symbol);
    }
}

impl IntegrityChecker for AlwaysOkIntegrity {
    fn check(&self, symbol: &Symbol) -> BoxFuture<'_, bool> {
        let ok = !self.failing.lock().contains(symbol);
        Box::pin(async move { ok })
    }
}

/// Static per-symbol tail risk with a default of zero.
#[derive(Default)]
pub struct StaticTailRisk {
    estimates: Mutex<HashMap<Symbol, f64>>,
}

impl StaticTailRisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: Symbol, mc_p95_dd: f64) {
        self.estimates.lock().insert(symbol, mc_p95_dd);
    }
}

impl TailRiskSource for StaticTailRisk {
    fn mc_p95_dd(&self, symbol: &Symbol) -> f64 {
        self.estimates.lock().get(symbol).copied().unwrap_or(0.0)
    }
}
