//! In-memory daily-bar oracle.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::trace;
use vigil_core::{day_bucket, Price, Symbol};

use crate::error::{OracleError, OracleResult};
use crate::provider::{BoxFuture, PricePoint, PriceProvider};

/// Daily close series per symbol with tolerance-based lookup.
///
/// Bars are keyed by their UTC-midnight bucket. A lookup answers with the
/// bar closest to the requested time, provided the gap is within tolerance;
/// otherwise the request fails as `PriceUnavailable` and the caller retries
/// on a later run once the bar has been ingested.
pub struct HistoricalPriceOracle {
    bars: RwLock<HashMap<Symbol, BTreeMap<i64, Price>>>,
    tolerance: Duration,
}

impl HistoricalPriceOracle {
    /// Default lookup tolerance: one daily bar.
    pub const DEFAULT_TOLERANCE_DAYS: i64 = 1;

    pub fn new() -> Self {
        Self::with_tolerance(Duration::days(Self::DEFAULT_TOLERANCE_DAYS))
    }

    pub fn with_tolerance(tolerance: Duration) -> Self {
        Self {
            bars: RwLock::new(HashMap::new()),
            tolerance,
        }
    }

    /// Ingest a daily close. The timestamp is bucketed to UTC midnight;
    /// re-ingesting the same day overwrites the close (late corrections).
    pub fn insert_bar(&self, symbol: Symbol, ts: DateTime<Utc>, close: Price) {
        let bucket = day_bucket(ts).timestamp_millis();
        self.bars.write().entry(symbol).or_default().insert(bucket, close);
    }

    /// Number of bars held for a symbol.
    pub fn bar_count(&self, symbol: &Symbol) -> usize {
        self.bars.read().get(symbol).map_or(0, |series| series.len())
    }

    fn lookup(&self, symbol: &Symbol, ts: DateTime<Utc>) -> OracleResult<PricePoint> {
        let bars = self.bars.read();
        let series = bars
            .get(symbol)
            .ok_or_else(|| OracleError::UnknownSymbol(symbol.clone()))?;

        let requested_ms = ts.timestamp_millis();

        // Closest bar at or before, and strictly after, the request.
        let before = series.range(..=requested_ms).next_back();
        let after = series.range(requested_ms + 1..).next();

        let nearest = match (before, after) {
            (Some(b), Some(a)) => {
                if requested_ms - b.0 <= a.0 - requested_ms {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        };

        match nearest {
            Some((&bar_ms, &price)) if (bar_ms - requested_ms).abs() <= self.tolerance.num_milliseconds() => {
                let actual_ts = DateTime::<Utc>::from_timestamp_millis(bar_ms)
                    .expect("bar timestamps are valid millis");
                trace!(%symbol, requested = %ts, actual = %actual_ts, "oracle bar hit");
                Ok(PricePoint { price, actual_ts })
            }
            _ => Err(OracleError::PriceUnavailable {
                symbol: symbol.clone(),
                requested: ts,
            }),
        }
    }
}

impl Default for HistoricalPriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceProvider for HistoricalPriceOracle {
    fn price_at(&self, symbol: &Symbol, ts: DateTime<Utc>) -> BoxFuture<'_, OracleResult<PricePoint>> {
        let symbol = symbol.clone();
        Box::pin(async move { self.lookup(&symbol, ts) })
    }
}
