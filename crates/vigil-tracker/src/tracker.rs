//! Due-snapshot resolution.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vigil_core::{
    Clock, Direction, EvaluationStatus, ForecastOutcome, ForecastResult, ForecastSnapshot,
    ResolvedFields,
};
use vigil_oracle::{OracleError, PriceProvider};
use vigil_scheduler::{RunStatus, Scheduler, Trigger};
use vigil_store::{OutcomeStore, SnapshotFilter, SnapshotStore, StoreError};

use crate::error::TrackerResult;

/// Tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Pending snapshots fetched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Minimum absolute realized move for a decided (WIN/LOSS) grade;
    /// anything inside is a DRAW.
    #[serde(default = "default_draw_epsilon")]
    pub draw_epsilon: f64,
    /// Lease duration in minutes when running under the scheduler.
    #[serde(default = "default_lease_minutes")]
    pub lease_minutes: i64,
    /// Job id for the standalone tracker job.
    #[serde(default = "default_job_id")]
    pub job_id: String,
}

fn default_batch_size() -> usize {
    200
}

fn default_draw_epsilon() -> f64 {
    0.001
}

fn default_lease_minutes() -> i64 {
    10
}

fn default_job_id() -> String {
    "outcome-tracker".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            draw_epsilon: default_draw_epsilon(),
            lease_minutes: default_lease_minutes(),
            job_id: default_job_id(),
        }
    }
}

/// Counters for one tracker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerReport {
    pub processed: usize,
    pub wins: usize,
    pub losses: usize,
    pub draws: usize,
    /// Snapshots skipped because no bar covered `resolve_at` yet.
    pub price_unavailable: usize,
    /// RESOLVED-without-outcome records repaired this run.
    pub repaired: usize,
    pub errors: usize,
}

impl TrackerReport {
    fn absorb(&mut self, other: TrackerReport) {
        self.processed += other.processed;
        self.wins += other.wins;
        self.losses += other.losses;
        self.draws += other.draws;
        self.price_unavailable += other.price_unavailable;
        self.repaired += other.repaired;
        self.errors += other.errors;
    }
}

/// Outcome tracker.
pub struct OutcomeTracker {
    snapshots: Arc<dyn SnapshotStore>,
    outcomes: Arc<dyn OutcomeStore>,
    oracle: Arc<dyn PriceProvider>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
}

impl OutcomeTracker {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        outcomes: Arc<dyn OutcomeStore>,
        oracle: Arc<dyn PriceProvider>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            snapshots,
            outcomes,
            oracle,
            clock,
            config,
        }
    }

    /// Grade a realized price against a snapshot.
    ///
    /// WIN when the realized sign matches the forecast direction and the
    /// move clears epsilon; LOSS on the opposite sign past epsilon; DRAW
    /// otherwise. FLAT forecasts have no sign to match, so they always
    /// grade DRAW and stay out of the hit rate.
    fn grade(&self, snapshot: &ForecastSnapshot, real_price: vigil_core::Price) -> ForecastResult {
        let realized_move = real_price.move_from(snapshot.start_price).unwrap_or(0.0);
        let epsilon = self.config.draw_epsilon;

        match snapshot.direction {
            Direction::Up => {
                if realized_move >= epsilon {
                    ForecastResult::Win
                } else if realized_move <= -epsilon {
                    ForecastResult::Loss
                } else {
                    ForecastResult::Draw
                }
            }
            Direction::Down => {
                if realized_move <= -epsilon {
                    ForecastResult::Win
                } else if realized_move >= epsilon {
                    ForecastResult::Loss
                } else {
                    ForecastResult::Draw
                }
            }
            Direction::Flat => ForecastResult::Draw,
        }
    }

    /// Resolve one due snapshot: price lookup, grade, CAS resolve, outcome
    /// put. Returns the graded result, or `None` when the snapshot was
    /// skipped (price unavailable / lost the CAS race).
    async fn resolve_one(
        &self,
        snapshot: &ForecastSnapshot,
        report: &mut TrackerReport,
    ) -> TrackerResult<Option<ForecastResult>> {
        let point = match self.oracle.price_at(&snapshot.symbol, snapshot.resolve_at).await {
            Ok(point) => point,
            Err(OracleError::PriceUnavailable { .. }) => {
                debug!(
                    fingerprint = %snapshot.fingerprint,
                    resolve_at = %snapshot.resolve_at,
                    "price unavailable, snapshot stays pending"
                );
                report.price_unavailable += 1;
                return Ok(None);
            }
            Err(err) => {
                warn!(fingerprint = %snapshot.fingerprint, %err, "oracle lookup failed");
                report.errors += 1;
                return Ok(None);
            }
        };

        let result = self.grade(snapshot, point.price);
        let deviation = point
            .price
            .deviation_from(snapshot.target_price, snapshot.start_price)
            .unwrap_or(0.0);

        let fields = ResolvedFields {
            real_price: point.price,
            result,
            deviation,
            resolved_at: snapshot.resolve_at,
        };

        // Critical section: the CAS decides the winner; the outcome put
        // rides on its result. A put failure here leaves a
        // RESOLVED-without-outcome snapshot for the repair pass.
        let resolved = match self.snapshots.resolve(&snapshot.fingerprint, &fields) {
            Ok(resolved) => resolved,
            Err(StoreError::AlreadyResolved(_)) => {
                debug!(fingerprint = %snapshot.fingerprint, "lost resolve race, yielding");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = ForecastOutcome::from_snapshot(&resolved)
            .expect("snapshot was just resolved by this worker");
        self.outcomes.put(outcome)?;

        Ok(Some(result))
    }

    /// Re-put outcomes for RESOLVED snapshots that are missing one.
    ///
    /// Covers the partial-failure window where a previous run's resolve
    /// succeeded but the outcome write failed. Both stores are idempotent,
    /// so re-deriving from the snapshot is safe to repeat.
    fn repair_missing_outcomes(&self, report: &mut TrackerReport) -> TrackerResult<()> {
        let filter = SnapshotFilter {
            status: Some(EvaluationStatus::Resolved),
            ..SnapshotFilter::default()
        };
        let resolved = self.snapshots.list(&filter, self.config.batch_size)?;

        for snapshot in resolved {
            if self.outcomes.get(&snapshot.fingerprint)?.is_some() {
                continue;
            }
            let Some(outcome) = ForecastOutcome::from_snapshot(&snapshot) else {
                continue;
            };
            if self.outcomes.put(outcome)?.inserted {
                warn!(
                    fingerprint = %snapshot.fingerprint,
                    "repaired missing outcome for resolved snapshot"
                );
                report.repaired += 1;
            }
        }
        Ok(())
    }

    /// Process one batch of due snapshots.
    pub async fn run_once(&self) -> TrackerResult<TrackerReport> {
        self.run_once_for(None).await
    }

    /// Process one batch, optionally narrowed to a single symbol.
    pub async fn run_once_for(
        &self,
        symbol: Option<&vigil_core::Symbol>,
    ) -> TrackerResult<TrackerReport> {
        let now = self.clock.now();
        let mut report = TrackerReport::default();

        self.repair_missing_outcomes(&mut report)?;

        let mut due = self.snapshots.list_pending(now, self.config.batch_size)?;
        if let Some(symbol) = symbol {
            due.retain(|snapshot| snapshot.symbol == *symbol);
        }
        for snapshot in &due {
            match self.resolve_one(snapshot, &mut report).await {
                Ok(Some(result)) => {
                    report.processed += 1;
                    match result {
                        ForecastResult::Win => report.wins += 1,
                        ForecastResult::Loss => report.losses += 1,
                        ForecastResult::Draw => report.draws += 1,
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    // One bad snapshot must not abort the batch.
                    error!(fingerprint = %snapshot.fingerprint, %err, "resolution failed");
                    report.errors += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            wins = report.wins,
            losses = report.losses,
            draws = report.draws,
            price_unavailable = report.price_unavailable,
            repaired = report.repaired,
            errors = report.errors,
            "tracker batch complete"
        );
        Ok(report)
    }

    /// Process batches until no more snapshots are due or the time budget
    /// runs out. `cancelled` is checked between batches.
    pub async fn resolve_until_empty(
        &self,
        time_budget: Duration,
        cancelled: impl Fn() -> bool,
    ) -> TrackerResult<TrackerReport> {
        let deadline = self.clock.now() + time_budget;
        let mut total = TrackerReport::default();

        loop {
            if cancelled() {
                info!("tracker cancelled between batches");
                break;
            }
            if self.clock.now() >= deadline {
                warn!("tracker time budget exhausted");
                break;
            }

            let batch = self.run_once().await?;
            let made_progress = batch.processed > 0 || batch.repaired > 0;
            total.absorb(batch);
            if !made_progress {
                break;
            }
        }
        Ok(total)
    }

    /// Run one batch under the scheduler's lease. Returns `None` when the
    /// lease is held elsewhere; the other worker is doing the work.
    pub async fn run_with_lease(
        &self,
        scheduler: &Scheduler,
        owner: &str,
    ) -> TrackerResult<Option<TrackerReport>> {
        scheduler.register_job(&self.config.job_id, None, true);
        let now = self.clock.now();
        let acquired = match scheduler.begin(
            &self.config.job_id,
            Trigger::Cron,
            owner,
            now,
            Duration::minutes(self.config.lease_minutes),
        ) {
            Ok(acquired) => acquired,
            Err(err) if err.is_concurrency_loss() => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let outcome = self.run_once().await;
        let (status, summary) = match &outcome {
            Ok(report) => (
                RunStatus::Success,
                format!("processed={} errors={}", report.processed, report.errors),
            ),
            Err(err) => (RunStatus::Failed, err.to_string()),
        };
        scheduler.finish(&acquired, status, Some(&summary), self.clock.now())?;

        outcome.map(Some)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
