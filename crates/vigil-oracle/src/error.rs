//! Error types for vigil-oracle.

use chrono::{DateTime, Utc};
use thiserror::Error;
use vigil_core::Symbol;

/// Oracle error types.
#[derive(Debug, Error)]
pub enum OracleError {
    /// No bar covers the requested time within tolerance. Transient: the
    /// caller retries on a later run.
    #[error("Price unavailable for {symbol} at {requested}")]
    PriceUnavailable {
        symbol: Symbol,
        requested: DateTime<Utc>,
    },

    /// Unknown symbol: the oracle has never seen a bar for it.
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(Symbol),
}

impl OracleError {
    /// Whether a later run can expect to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PriceUnavailable { .. })
    }
}

/// Result type alias for oracle operations.
pub type OracleResult<T> = std::result::Result<T, OracleError>;
