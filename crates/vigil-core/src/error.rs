//! Error types for vigil-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Unknown horizon: {0}")]
    UnknownHorizon(String),

    #[error("Confidence out of bounds: {0}")]
    ConfidenceOutOfBounds(f64),

    #[error("Non-finite price: {0}")]
    NonFinitePrice(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
