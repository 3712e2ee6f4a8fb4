//! Price provider trait and test doubles.
//!
//! Trait-based abstraction over historical price lookup. This allows:
//! - Dependency injection for testing
//! - Separation of resolution logic from data transport
//! - Future flexibility in provider implementation

use std::collections::HashMap;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use vigil_core::{Price, Symbol};

use crate::error::{OracleError, OracleResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A price observation returned by the oracle.
///
/// `actual_ts` is the timestamp of the bar that answered the request; it may
/// differ from the requested time by up to the provider's tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Price,
    pub actual_ts: DateTime<Utc>,
}

/// Historical price lookup port.
pub trait PriceProvider: Send + Sync {
    /// Price of `symbol` at (or near) `ts`.
    fn price_at(&self, symbol: &Symbol, ts: DateTime<Utc>) -> BoxFuture<'_, OracleResult<PricePoint>>;
}

/// Fixed-table provider for tests.
///
/// Answers only exactly-keyed (symbol, timestamp) entries; everything else
/// is `PriceUnavailable`. Entries can be added while shared, so a test can
/// make a price appear between tracker runs.
#[derive(Default)]
pub struct FixedPriceOracle {
    prices: Mutex<HashMap<(Symbol, i64), Price>>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a price for an exact timestamp.
    pub fn set_price(&self, symbol: Symbol, ts: DateTime<Utc>, price: Price) {
        self.prices
            .lock()
            .insert((symbol, ts.timestamp_millis()), price);
    }

    /// Remove a price, making subsequent lookups unavailable again.
    pub fn clear_price(&self, symbol: &Symbol, ts: DateTime<Utc>) {
        self.prices
            .lock()
            .remove(&(symbol.clone(), ts.timestamp_millis()));
    }
}

impl PriceProvider for FixedPriceOracle {
    fn price_at(&self, symbol: &Symbol, ts: DateTime<Utc>) -> BoxFuture<'_, OracleResult<PricePoint>> {
        let key = (symbol.clone(), ts.timestamp_millis());
        let symbol = symbol.clone();
        Box::pin(async move {
            match self.prices.lock().get(&key) {
                Some(price) => Ok(PricePoint {
                    price: *price,
                    actual_ts: ts,
                }),
                None => Err(OracleError::PriceUnavailable {
                    symbol,
                    requested: ts,
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fixed_oracle_hit_and_miss() {
        let oracle = FixedPriceOracle::new();
        let btc = Symbol::new("BTC").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap();

        let miss = oracle.price_at(&btc, ts).await;
        assert!(matches!(miss, Err(OracleError::PriceUnavailable { .. })));

        oracle.set_price(btc.clone(), ts, Price::new(dec!(70000)));
        let hit = oracle.price_at(&btc, ts).await.unwrap();
        assert_eq!(hit.price, Price::new(dec!(70000)));
        assert_eq!(hit.actual_ts, ts);
    }
}
