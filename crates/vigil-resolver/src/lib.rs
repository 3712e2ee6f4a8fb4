//! Hierarchical signal resolver.
//!
//! Aggregates per-horizon signals in three stages:
//! 1. **Bias**: weighted across all horizons, STRUCTURE tier dominant
//! 2. **Timing**: TIMING + TACTICAL horizons only
//! 3. **Final**: mode, action, and size multiplier, with governance
//!    applied last and AVOID terminal
//!
//! The resolver is a pure in-memory function: identical inputs produce
//! bit-identical outputs across runs and processes. Horizons are always
//! processed in canonical order and every tie-break resolves to the
//! earlier horizon in that order.

pub mod config;
pub mod decision;
pub mod error;
pub mod stages;
pub mod types;

pub use config::ResolverConfig;
pub use decision::resolve;
pub use error::{ResolverError, ResolverResult};
pub use stages::{
    compute_bias, compute_timing, BiasDirection, BiasResolution, HorizonContribution,
    TimingAction, TimingResolution,
};
pub use types::{
    DecisionMode, DivergenceGrade, ExternalModifier, FinalAction, GovernanceDirective,
    HorizonInput, MacroFlag, ResolvedDecision, ResolverInput, TailStats,
};
