//! Cohort quality and drift classification.
//!
//! Quality maps a single cohort's rollup to GOOD/NEUTRAL/WEAK. Drift
//! compares a LIVE cohort against one or more VINTAGE baselines and grades
//! the degradation on an OK/WATCH/WARN/CRITICAL ladder. Both are pure
//! functions of the inputs; thresholds always arrive via configuration and
//! are never hard-coded at call sites.

pub mod drift;
pub mod quality;

pub use drift::{
    compare_cohorts, overall_severity, recommendation_for, DriftComparison, DriftConfidence,
    DriftDelta, DriftRecommendation, DriftRung, DriftSeverity, DriftThresholds,
};
pub use quality::{classify_quality, QualityAssessment, QualityConfig, QualityState};
