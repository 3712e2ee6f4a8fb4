//! Error types for vigil-resolver.

use thiserror::Error;

/// Resolver error types. All are contract violations at the input boundary;
/// a well-formed input never fails.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Signal value out of bounds: {field} = {value}")]
    OutOfBounds { field: &'static str, value: f64 },

    #[error("No horizon inputs supplied")]
    NoHorizons,

    #[error("Duplicate horizon input: {0}")]
    DuplicateHorizon(String),
}

/// Result type alias for resolver operations.
pub type ResolverResult<T> = std::result::Result<T, ResolverError>;
