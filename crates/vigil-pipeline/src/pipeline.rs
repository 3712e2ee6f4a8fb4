//! The daily pipeline sequencer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vigil_alerts::{AlertEvent, AlertGate, AlertLevel, AlertSink, AlertType};
use vigil_core::{Clock, CohortKey, GovernanceMode, Horizon, Preset, Role, Symbol};
use vigil_governance::{EvaluationOutcome, GovernanceEngine, GovernanceInput, GovernanceState};
use vigil_quality::{
    classify_quality, compare_cohorts, DriftComparison, DriftConfidence, DriftSeverity,
    DriftThresholds, QualityConfig, QualityState,
};
use vigil_scheduler::{JobRun, RunStatus, Scheduler, StepRecord, Trigger};
use vigil_snapshot::SnapshotWriter;
use vigil_stats::{CohortStats, OutcomeSample, StatsConfig};
use vigil_store::{OutcomeFilter, OutcomeStore};
use vigil_telemetry::metrics::{
    set_governance_mode, ALERT_DECISIONS_TOTAL, OUTCOMES_RESOLVED_TOTAL, PIPELINE_STEP_DURATION_MS,
    SNAPSHOTS_WRITTEN_TOTAL, TRACKER_BATCH_SIZE,
};
use vigil_tracker::OutcomeTracker;

use crate::error::{PipelineError, PipelineResult};
use crate::ports::{IntegrityChecker, ModelOutputSource, TailRiskSource};

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_job_id")]
    pub job_id: String,
    /// Daily UTC schedule as "HH:MM".
    #[serde(default = "default_schedule_utc")]
    pub schedule_utc: String,
    #[serde(default = "default_lease_minutes")]
    pub lease_minutes: i64,
    /// Symbols driven by this pipeline.
    pub symbols: Vec<Symbol>,
    /// Active horizon/preset/role grid for snapshot writing and stats.
    #[serde(default = "default_horizons")]
    pub horizons: Vec<Horizon>,
    #[serde(default = "default_presets")]
    pub presets: Vec<Preset>,
    #[serde(default = "default_roles")]
    pub roles: Vec<Role>,
    /// Outcome-resolution time budget in seconds.
    #[serde(default = "default_tracker_budget_secs")]
    pub tracker_budget_secs: i64,
    /// LIVE cohort window for drift comparisons.
    #[serde(default = "default_live_window")]
    pub live_window: usize,
    /// Baseline cohort window for drift comparisons.
    #[serde(default = "default_baseline_window")]
    pub baseline_window: usize,
    #[serde(default = "default_baseline_label")]
    pub baseline_label: String,
}

fn default_job_id() -> String {
    "daily-run".to_string()
}

fn default_schedule_utc() -> String {
    "05:30".to_string()
}

fn default_lease_minutes() -> i64 {
    30
}

fn default_horizons() -> Vec<Horizon> {
    Horizon::ALL.to_vec()
}

fn default_presets() -> Vec<Preset> {
    vec![Preset::Conservative, Preset::Balanced, Preset::Aggressive]
}

fn default_roles() -> Vec<Role> {
    vec![Role::Active, Role::Shadow]
}

fn default_tracker_budget_secs() -> i64 {
    120
}

fn default_live_window() -> usize {
    30
}

fn default_baseline_window() -> usize {
    200
}

fn default_baseline_label() -> String {
    "BASELINE-FULL".to_string()
}

/// Per-symbol rollup of step 5, consumed by governance and alerts.
#[derive(Debug, Clone)]
struct SymbolAssessment {
    quality: QualityState,
    quality_capped: bool,
    drift_severity: DriftSeverity,
    drift_confidence: DriftConfidence,
    worst_comparison: Option<DriftComparison>,
}

/// The daily pipeline.
pub struct DailyPipeline {
    outcomes: Arc<dyn OutcomeStore>,
    writer: SnapshotWriter,
    tracker: OutcomeTracker,
    model_source: Arc<dyn ModelOutputSource>,
    integrity: Arc<dyn IntegrityChecker>,
    tail_risk: Arc<dyn TailRiskSource>,
    governance: Arc<GovernanceEngine>,
    gate: Arc<AlertGate>,
    sink: Arc<dyn AlertSink>,
    scheduler: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
    stats_config: StatsConfig,
    quality_config: QualityConfig,
    drift_thresholds: DriftThresholds,
    config: PipelineConfig,
    /// Derived cohort stats, swapped wholesale at the end of the stats
    /// step so readers never see a half-refreshed table.
    stats_cache: RwLock<HashMap<CohortKey, CohortStats>>,
    /// Read cache of governance states, refreshed after the governance
    /// step.
    governance_cache: RwLock<HashMap<Symbol, GovernanceState>>,
}

impl DailyPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        outcomes: Arc<dyn OutcomeStore>,
        writer: SnapshotWriter,
        tracker: OutcomeTracker,
        model_source: Arc<dyn ModelOutputSource>,
        integrity: Arc<dyn IntegrityChecker>,
        tail_risk: Arc<dyn TailRiskSource>,
        governance: Arc<GovernanceEngine>,
        gate: Arc<AlertGate>,
        sink: Arc<dyn AlertSink>,
        scheduler: Arc<Scheduler>,
        clock: Arc<dyn Clock>,
        stats_config: StatsConfig,
        quality_config: QualityConfig,
        drift_thresholds: DriftThresholds,
        config: PipelineConfig,
    ) -> Self {
        scheduler.register_job(&config.job_id, Some(&config.schedule_utc), true);
        Self {
            outcomes,
            writer,
            tracker,
            model_source,
            integrity,
            tail_risk,
            governance,
            gate,
            sink,
            scheduler,
            clock,
            stats_config,
            quality_config,
            drift_thresholds,
            config,
            stats_cache: RwLock::new(HashMap::new()),
            governance_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Cached cohort stats from the last refresh.
    pub fn cached_stats(&self, key: &CohortKey) -> Option<CohortStats> {
        self.stats_cache.read().get(key).cloned()
    }

    /// Cached governance state from the last evaluation.
    pub fn cached_governance(&self, symbol: &Symbol) -> Option<GovernanceState> {
        self.governance_cache.read().get(symbol).cloned()
    }

    fn cohort_grid(&self, symbol: &Symbol) -> Vec<CohortKey> {
        let mut grid = Vec::new();
        for &horizon in &self.config.horizons {
            for &preset in &self.config.presets {
                for &role in &self.config.roles {
                    grid.push(CohortKey::new(symbol.clone(), horizon, preset, role));
                }
            }
        }
        grid
    }

    fn samples_for(&self, key: &CohortKey, window: usize) -> PipelineResult<Vec<OutcomeSample>> {
        let outcomes = self
            .outcomes
            .query(&OutcomeFilter::cohort(key), window)?;
        Ok(outcomes.iter().map(OutcomeSample::from).collect())
    }

    /// Run the full pipeline once under the scheduler lease.
    ///
    /// Returns `AlreadyRunning` without writing any run record when another
    /// worker holds the lease.
    pub async fn run(&self, trigger: Trigger, owner: &str) -> PipelineResult<JobRun> {
        let now = self.clock.now();
        let acquired = match self.scheduler.begin(
            &self.config.job_id,
            trigger,
            owner,
            now,
            Duration::minutes(self.config.lease_minutes),
        ) {
            Ok(acquired) => acquired,
            Err(err) if err.is_concurrency_loss() => {
                return Err(PipelineError::AlreadyRunning(self.config.job_id.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        let run_id = acquired.run_id.clone();

        info!(job_id = %self.config.job_id, %run_id, %trigger, "daily pipeline starting");

        let mut failed_step: Option<String> = None;
        let mut cancelled = false;

        // Step outputs threaded through the sequence.
        let mut healthy_symbols: Vec<Symbol> = Vec::new();
        let mut assessments: HashMap<Symbol, SymbolAssessment> = HashMap::new();
        let mut transitions: Vec<(Symbol, EvaluationOutcome)> = Vec::new();

        const STEPS: [&str; 7] = [
            "IntegrityCheck",
            "SnapshotWrite",
            "OutcomeResolve",
            "StatsRefresh",
            "QualityAndDrift",
            "Governance",
            "Alerts",
        ];

        for step_name in STEPS {
            if !cancelled && self.scheduler.is_cancel_requested(&run_id) {
                cancelled = true;
            }
            if cancelled {
                self.scheduler
                    .append_step(&run_id, StepRecord::skipped(step_name, "run cancelled"))?;
                continue;
            }
            if let Some(ref blocker) = failed_step {
                let note = format!("upstream step {} failed", blocker);
                self.scheduler
                    .append_step(&run_id, StepRecord::skipped(step_name, &note))?;
                continue;
            }

            let started = self.clock.now();
            let outcome = match step_name {
                "IntegrityCheck" => self.step_integrity(&mut healthy_symbols).await,
                "SnapshotWrite" => self.step_snapshot_write(&healthy_symbols).await,
                "OutcomeResolve" => self.step_outcome_resolve(&run_id).await,
                "StatsRefresh" => self.step_stats_refresh(),
                "QualityAndDrift" => self.step_quality_and_drift(&mut assessments),
                "Governance" => self.step_governance(&assessments, &mut transitions),
                "Alerts" => self.step_alerts(&assessments, &transitions).await,
                _ => unreachable!("unknown step"),
            };
            let duration_ms = (self.clock.now() - started).num_milliseconds();

            match outcome {
                Ok((count, note)) => {
                    PIPELINE_STEP_DURATION_MS
                        .with_label_values(&[step_name, "success"])
                        .observe(duration_ms as f64);
                    let mut record = StepRecord::success(step_name, duration_ms, Some(count));
                    record.note = note;
                    self.scheduler.append_step(&run_id, record)?;
                }
                Err(err) => {
                    PIPELINE_STEP_DURATION_MS
                        .with_label_values(&[step_name, "failed"])
                        .observe(duration_ms as f64);
                    warn!(step = step_name, %err, "pipeline step failed");
                    self.scheduler.append_step(
                        &run_id,
                        StepRecord::failed(step_name, duration_ms, &err.to_string()),
                    )?;
                    failed_step = Some(step_name.to_string());
                }
            }
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else if failed_step.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        let summary = match (&failed_step, cancelled) {
            (_, true) => "cancelled".to_string(),
            (Some(step), _) => format!("failed at {}", step),
            (None, false) => format!("{} symbols processed", self.config.symbols.len()),
        };

        let run = self
            .scheduler
            .finish(&acquired, status, Some(&summary), self.clock.now())?;
        info!(%run_id, status = %status, "daily pipeline finished");
        Ok(run)
    }

    /// Step 1: per-symbol integrity prerequisites. Failing symbols are
    /// excluded from snapshot writing; the verdicts themselves come from
    /// an external collaborator.
    async fn step_integrity(
        &self,
        healthy_symbols: &mut Vec<Symbol>,
    ) -> PipelineResult<(u64, Option<String>)> {
        let mut excluded = Vec::new();
        for symbol in &self.config.symbols {
            if self.integrity.check(symbol).await {
                healthy_symbols.push(symbol.clone());
            } else {
                excluded.push(symbol.to_string());
            }
        }
        let note = if excluded.is_empty() {
            None
        } else {
            Some(format!("excluded: {}", excluded.join(", ")))
        };
        Ok((healthy_symbols.len() as u64, note))
    }

    /// Step 2: write the day's snapshots for every healthy symbol.
    async fn step_snapshot_write(
        &self,
        healthy_symbols: &[Symbol],
    ) -> PipelineResult<(u64, Option<String>)> {
        let as_of = self.clock.now();
        let mut written = 0u64;
        let mut skipped = 0u64;

        for symbol in healthy_symbols {
            let outputs = self.model_source.outputs_for(symbol, as_of).await;
            if outputs.is_empty() {
                continue;
            }
            let report = self.writer.write_bundle(symbol, &outputs, as_of)?;
            written += report.written as u64;
            skipped += report.skipped_duplicate as u64;
            SNAPSHOTS_WRITTEN_TOTAL
                .with_label_values(&[symbol.as_str(), "inserted"])
                .inc_by(report.written as f64);
            SNAPSHOTS_WRITTEN_TOTAL
                .with_label_values(&[symbol.as_str(), "duplicate"])
                .inc_by(report.skipped_duplicate as f64);
        }

        let note = (skipped > 0).then(|| format!("{} duplicates skipped", skipped));
        Ok((written, note))
    }

    /// Step 3: resolve due snapshots until drained or out of budget.
    async fn step_outcome_resolve(&self, run_id: &str) -> PipelineResult<(u64, Option<String>)> {
        let scheduler = self.scheduler.clone();
        let run_id = run_id.to_string();
        let report = self
            .tracker
            .resolve_until_empty(Duration::seconds(self.config.tracker_budget_secs), move || {
                scheduler.is_cancel_requested(&run_id)
            })
            .await?;

        for (result, count) in [
            ("WIN", report.wins),
            ("LOSS", report.losses),
            ("DRAW", report.draws),
        ] {
            OUTCOMES_RESOLVED_TOTAL
                .with_label_values(&["all", result])
                .inc_by(count as f64);
        }
        TRACKER_BATCH_SIZE
            .with_label_values(&[&self.config.job_id])
            .observe(report.processed as f64);

        let note = (report.errors > 0 || report.price_unavailable > 0).then(|| {
            format!(
                "errors={} price_unavailable={}",
                report.errors, report.price_unavailable
            )
        });
        Ok((report.processed as u64, note))
    }

    /// Step 4: recompute cohort stats and swap the cache atomically.
    fn step_stats_refresh(&self) -> PipelineResult<(u64, Option<String>)> {
        let now = self.clock.now();
        let mut refreshed: HashMap<CohortKey, CohortStats> = HashMap::new();

        for symbol in &self.config.symbols {
            for key in self.cohort_grid(symbol) {
                let samples = self.samples_for(&key, self.config.baseline_window)?;
                if samples.is_empty() {
                    continue;
                }
                refreshed.insert(key, CohortStats::compute(&samples, &self.stats_config, now));
            }
        }

        let count = refreshed.len() as u64;
        *self.stats_cache.write() = refreshed;
        Ok((count, None))
    }

    /// Step 5: classify quality and drift per symbol over ACTIVE cohorts.
    ///
    /// SHADOW cohorts are evaluated in the stats cache for observation but
    /// must never influence governance, so the rollup here reads ACTIVE
    /// only.
    fn step_quality_and_drift(
        &self,
        assessments: &mut HashMap<Symbol, SymbolAssessment>,
    ) -> PipelineResult<(u64, Option<String>)> {
        let now = self.clock.now();
        let mut cohorts_examined = 0u64;

        for symbol in &self.config.symbols {
            let mut worst_quality = QualityState::Good;
            let mut any_quality = false;
            let mut quality_capped = true;
            let mut worst: Option<DriftComparison> = None;

            for key in self.cohort_grid(symbol) {
                if key.role != Role::Active {
                    continue;
                }
                let baseline_samples = self.samples_for(&key, self.config.baseline_window)?;
                if baseline_samples.is_empty() {
                    continue;
                }
                cohorts_examined += 1;

                let baseline =
                    CohortStats::compute(&baseline_samples, &self.stats_config, now);
                let live_start = baseline_samples
                    .len()
                    .saturating_sub(self.config.live_window);
                let live =
                    CohortStats::compute(&baseline_samples[live_start..], &self.stats_config, now);

                let assessment = classify_quality(&live, &self.quality_config);
                any_quality = true;
                quality_capped &= assessment.sample_capped;
                if quality_rank(assessment.state) > quality_rank(worst_quality) {
                    worst_quality = assessment.state;
                }

                let comparison = compare_cohorts(
                    &self.config.baseline_label,
                    &live,
                    &baseline,
                    &self.drift_thresholds,
                );
                let is_worse = worst
                    .as_ref()
                    .map_or(true, |current| comparison.severity > current.severity);
                if is_worse {
                    worst = Some(comparison);
                }
            }

            let assessment = SymbolAssessment {
                quality: if any_quality {
                    worst_quality
                } else {
                    QualityState::Neutral
                },
                quality_capped: !any_quality || quality_capped,
                drift_severity: worst
                    .as_ref()
                    .map_or(DriftSeverity::Ok, |c| c.severity),
                drift_confidence: worst
                    .as_ref()
                    .map_or(DriftConfidence::Low, |c| c.confidence),
                worst_comparison: worst,
            };
            assessments.insert(symbol.clone(), assessment);
        }

        Ok((cohorts_examined, None))
    }

    /// Step 6: governance evaluation per symbol, single-writer.
    fn step_governance(
        &self,
        assessments: &HashMap<Symbol, SymbolAssessment>,
        transitions: &mut Vec<(Symbol, EvaluationOutcome)>,
    ) -> PipelineResult<(u64, Option<String>)> {
        let now = self.clock.now();
        let mut changed = 0u64;

        for symbol in &self.config.symbols {
            let Some(assessment) = assessments.get(symbol) else {
                continue;
            };
            // A sample-capped WEAK must read as NEUTRAL here.
            let quality = if assessment.quality_capped {
                QualityState::Neutral
            } else {
                assessment.quality
            };
            let input = GovernanceInput {
                drift_severity: assessment.drift_severity,
                drift_confidence: assessment.drift_confidence,
                quality,
                mc_p95_dd: self.tail_risk.mc_p95_dd(symbol),
                active_policy_hash: self.writer.policy_hash().to_string(),
            };
            let outcome = self.governance.evaluate(symbol, &input, now);
            set_governance_mode(symbol.as_str(), &outcome.current.to_string());
            if outcome.changed {
                changed += 1;
            }
            transitions.push((symbol.clone(), outcome));
        }

        // Refresh the read cache after all evaluations.
        let mut cache = HashMap::new();
        for symbol in &self.config.symbols {
            cache.insert(symbol.clone(), self.governance.get(symbol, now));
        }
        *self.governance_cache.write() = cache;

        Ok((changed, None))
    }

    /// Step 7: raise events from the run's state changes and push the
    /// survivors through the policy gate to the sink.
    async fn step_alerts(
        &self,
        assessments: &HashMap<Symbol, SymbolAssessment>,
        transitions: &[(Symbol, EvaluationOutcome)],
    ) -> PipelineResult<(u64, Option<String>)> {
        let now = self.clock.now();
        let mut events: Vec<AlertEvent> = Vec::new();

        for (symbol, outcome) in transitions {
            if !outcome.changed {
                continue;
            }
            let context = format!("{}->{}", outcome.previous, outcome.current);
            let (alert_type, level) = if outcome.current == GovernanceMode::Halt {
                (AlertType::CrisisEnter, AlertLevel::Critical)
            } else if outcome.previous == GovernanceMode::Halt {
                (AlertType::CrisisExit, AlertLevel::High)
            } else if outcome.current > outcome.previous {
                (AlertType::RegimeShift, AlertLevel::High)
            } else {
                (AlertType::RegimeShift, AlertLevel::Info)
            };
            events.push(AlertEvent {
                symbol: symbol.clone(),
                alert_type,
                level,
                message: format!("governance {}", context),
                key_context: context,
                triggered_at: now,
            });
        }

        for (symbol, assessment) in assessments {
            match assessment.drift_severity {
                DriftSeverity::Ok => {}
                severity => {
                    let level = match severity {
                        DriftSeverity::Critical => AlertLevel::Critical,
                        DriftSeverity::Warn => AlertLevel::High,
                        _ => AlertLevel::Info,
                    };
                    let baseline = assessment
                        .worst_comparison
                        .as_ref()
                        .map(|c| c.baseline.clone())
                        .unwrap_or_else(|| self.config.baseline_label.clone());
                    events.push(AlertEvent {
                        symbol: symbol.clone(),
                        alert_type: AlertType::Drift,
                        level,
                        message: format!("drift {} vs {}", severity, baseline),
                        key_context: format!("{}:{}", baseline, severity),
                        triggered_at: now,
                    });
                }
            }

            if assessment.quality == QualityState::Weak && !assessment.quality_capped {
                events.push(AlertEvent {
                    symbol: symbol.clone(),
                    alert_type: AlertType::HealthDrop,
                    level: AlertLevel::High,
                    message: "live quality WEAK".to_string(),
                    key_context: "quality-weak".to_string(),
                    triggered_at: now,
                });
            }

            let mc = self.tail_risk.mc_p95_dd(symbol);
            let tail = if mc >= 0.55 {
                Some((AlertLevel::Critical, "mc>=0.55"))
            } else if mc >= 0.40 {
                Some((AlertLevel::High, "mc>=0.40"))
            } else {
                None
            };
            if let Some((level, bucket)) = tail {
                events.push(AlertEvent {
                    symbol: symbol.clone(),
                    alert_type: AlertType::TailSpike,
                    level,
                    message: format!("tail risk mcP95DD={:.3}", mc),
                    key_context: bucket.to_string(),
                    triggered_at: now,
                });
            }
        }

        let decisions = self.gate.decide_batch(events, now);
        let mut sent = 0u64;
        for decision in &decisions {
            ALERT_DECISIONS_TOTAL
                .with_label_values(&[
                    &decision.record.level.to_string(),
                    &decision.record.blocked_by.to_string(),
                ])
                .inc();
            if !decision.was_sent() {
                continue;
            }
            let event = AlertEvent {
                symbol: decision.record.symbol.clone(),
                alert_type: decision.record.alert_type,
                level: decision.record.level,
                message: decision.record.message.clone(),
                key_context: String::new(),
                triggered_at: decision.record.triggered_at,
            };
            let receipt = self.sink.send(&event).await;
            if receipt.delivered {
                sent += 1;
            } else {
                // Transport errors are retriable; the gate decision stands
                // and a later run may re-raise the event.
                warn!(
                    symbol = %event.symbol,
                    error = ?receipt.transport_error,
                    "alert delivery failed"
                );
            }
        }

        let blocked = decisions.len() as u64 - sent;
        let note = (blocked > 0).then(|| format!("{} blocked or undelivered", blocked));
        Ok((sent, note))
    }
}

fn quality_rank(state: QualityState) -> u8 {
    match state {
        QualityState::Good => 0,
        QualityState::Neutral => 1,
        QualityState::Weak => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use vigil_alerts::{AlertPolicyConfig, RecordingSink};
    use vigil_core::{
        Direction, ForecastOutcome, ForecastResult, ManualClock, ModelOutput, Price,
    };
    use vigil_governance::GovernanceConfig;
    use vigil_oracle::FixedPriceOracle;
    use vigil_store::{MemoryOutcomeStore, MemorySnapshotStore, SnapshotStore};
    use vigil_tracker::TrackerConfig;

    use crate::ports::{AlwaysOkIntegrity, FixedModelOutputSource, StaticTailRisk};

    fn btc() -> Symbol {
        Symbol::new("BTC").unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    struct Fixture {
        snapshots: Arc<MemorySnapshotStore>,
        outcomes: Arc<MemoryOutcomeStore>,
        oracle: Arc<FixedPriceOracle>,
        clock: Arc<ManualClock>,
        model_source: Arc<FixedModelOutputSource>,
        integrity: Arc<AlwaysOkIntegrity>,
        tail_risk: Arc<StaticTailRisk>,
        governance: Arc<GovernanceEngine>,
        sink: Arc<RecordingSink>,
        scheduler: Arc<Scheduler>,
        pipeline: DailyPipeline,
    }

    fn fixture() -> Fixture {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let outcomes = Arc::new(MemoryOutcomeStore::new());
        let oracle = Arc::new(FixedPriceOracle::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let model_source = Arc::new(FixedModelOutputSource::new());
        let integrity = Arc::new(AlwaysOkIntegrity::new());
        let tail_risk = Arc::new(StaticTailRisk::new());
        let governance = Arc::new(GovernanceEngine::new(GovernanceConfig::default()));
        let sink = Arc::new(RecordingSink::new());
        let scheduler = Arc::new(Scheduler::new());

        let writer = SnapshotWriter::new(snapshots.clone(), "policy-1", "engine-v1");
        let tracker = OutcomeTracker::new(
            snapshots.clone(),
            outcomes.clone(),
            oracle.clone(),
            clock.clone(),
            TrackerConfig::default(),
        );

        let config = PipelineConfig {
            job_id: default_job_id(),
            schedule_utc: default_schedule_utc(),
            lease_minutes: default_lease_minutes(),
            symbols: vec![btc()],
            horizons: vec![Horizon::D7],
            presets: vec![Preset::Balanced],
            roles: vec![Role::Active, Role::Shadow],
            tracker_budget_secs: default_tracker_budget_secs(),
            live_window: default_live_window(),
            baseline_window: default_baseline_window(),
            baseline_label: default_baseline_label(),
        };

        let pipeline = DailyPipeline::new(
            outcomes.clone(),
            writer,
            tracker,
            model_source.clone(),
            integrity.clone(),
            tail_risk.clone(),
            governance.clone(),
            Arc::new(AlertGate::new(AlertPolicyConfig::default())),
            sink.clone(),
            scheduler.clone(),
            clock.clone(),
            StatsConfig::default(),
            QualityConfig::default(),
            DriftThresholds::default(),
            config,
        );

        Fixture {
            snapshots,
            outcomes,
            oracle,
            clock,
            model_source,
            integrity,
            tail_risk,
            governance,
            sink,
            scheduler,
            pipeline,
        }
    }

    fn model_output() -> ModelOutput {
        ModelOutput {
            horizon: Horizon::D7,
            preset: Preset::Balanced,
            role: Role::Active,
            direction: Direction::Up,
            confidence: 0.72,
            expected_move_pct: 0.018,
            current_price: Price::new(dec!(68000)),
        }
    }

    fn seed_loss_outcomes(fixture: &Fixture, count: usize) {
        for i in 0..count {
            let resolved_at = t0() - Duration::days((count - i) as i64);
            fixture
                .outcomes
                .put(ForecastOutcome {
                    snapshot_ref: format!("loss-{i}"),
                    symbol: btc(),
                    horizon: Horizon::D7,
                    preset: Preset::Balanced,
                    role: Role::Active,
                    policy_hash: "policy-1".to_string(),
                    start_price: Price::new(dec!(68000)),
                    target_price: Price::new(dec!(69224)),
                    real_price: Price::new(dec!(66000)),
                    result: ForecastResult::Loss,
                    direction_correct: false,
                    deviation: 0.02,
                    realized_move_pct: -0.029 - 0.0001 * i as f64,
                    realized_return: -0.029 - 0.0001 * i as f64,
                    confidence: 0.7,
                    created_at: resolved_at - Duration::days(7),
                    resolved_at,
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_full_run_success_with_all_steps() {
        let fixture = fixture();
        fixture
            .model_source
            .set_outputs(btc(), vec![model_output()]);

        let run = fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.steps.len(), 7);
        assert!(run.steps.iter().all(|s| s.status == vigil_scheduler::StepStatus::Success));

        // Snapshot written.
        let write_step = &run.steps[1];
        assert_eq!(write_step.name, "SnapshotWrite");
        assert_eq!(write_step.count, Some(1));
        assert_eq!(fixture.snapshots.count(), 1);
    }

    #[tokio::test]
    async fn test_second_run_same_day_dedupes_snapshots() {
        let fixture = fixture();
        fixture
            .model_source
            .set_outputs(btc(), vec![model_output()]);

        fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap();
        let run = fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap();

        let write_step = &run.steps[1];
        assert_eq!(write_step.count, Some(0));
        assert_eq!(fixture.snapshots.count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_yields_without_record() {
        let fixture = fixture();
        let held = fixture
            .scheduler
            .begin(
                "daily-run",
                Trigger::Manual,
                "other",
                fixture.clock.now(),
                Duration::minutes(30),
            )
            .unwrap();

        let err = fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRunning(_)));
        assert_eq!(fixture.scheduler.list_runs("daily-run").len(), 1);

        fixture
            .scheduler
            .finish(&held, RunStatus::Success, None, fixture.clock.now())
            .unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_snapshot_to_outcome_across_days() {
        let fixture = fixture();
        fixture
            .model_source
            .set_outputs(btc(), vec![model_output()]);

        // Day 0: snapshot written.
        fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap();

        // Day 7: the horizon elapses; the oracle has the terminal bar.
        let resolve_day = t0() + Duration::days(7);
        fixture.clock.set(resolve_day);
        fixture
            .oracle
            .set_price(btc(), resolve_day, Price::new(dec!(70000)));
        fixture.model_source.set_outputs(btc(), Vec::new());

        let run = fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap();
        assert_eq!(run.status, RunStatus::Success);
        let resolve_step = &run.steps[2];
        assert_eq!(resolve_step.name, "OutcomeResolve");
        assert_eq!(resolve_step.count, Some(1));

        let stats_step = &run.steps[3];
        assert_eq!(stats_step.count, Some(1));

        let key = CohortKey::new(btc(), Horizon::D7, Preset::Balanced, Role::Active);
        let stats = fixture.pipeline.cached_stats(&key).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.wins, 1);
    }

    #[tokio::test]
    async fn test_integrity_failure_excludes_symbol_from_writes() {
        let fixture = fixture();
        fixture
            .model_source
            .set_outputs(btc(), vec![model_output()]);
        fixture.integrity.fail_symbol(btc());

        let run = fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap();
        assert_eq!(run.status, RunStatus::Success);

        let integrity_step = &run.steps[0];
        assert_eq!(integrity_step.count, Some(0));
        assert!(integrity_step.note.as_ref().unwrap().contains("BTC"));
        assert_eq!(fixture.snapshots.count(), 0);
    }

    #[tokio::test]
    async fn test_weak_quality_streak_halts_and_alerts() {
        let fixture = fixture();
        // 12 losses: WEAK quality with sufficient samples.
        seed_loss_outcomes(&fixture, 12);

        // Three daily evaluations build the weak streak.
        for day in 0..3 {
            fixture.clock.set(t0() + Duration::days(day));
            let run = fixture.pipeline.run(Trigger::Cron, "worker-1").await.unwrap();
            assert_eq!(run.status, RunStatus::Success);
        }

        let state = fixture.governance.get(&btc(), fixture.clock.now());
        assert_eq!(state.mode, GovernanceMode::Halt);
        assert!(fixture
            .pipeline
            .cached_governance(&btc())
            .is_some_and(|s| s.mode == GovernanceMode::Halt));

        // The transition raised a CRISIS_ENTER that reached the sink.
        let delivered = fixture.sink.delivered();
        assert!(delivered
            .iter()
            .any(|e| e.alert_type == AlertType::CrisisEnter && e.level == AlertLevel::Critical));
        // HEALTH_DROP was raised too.
        assert!(delivered
            .iter()
            .any(|e| e.alert_type == AlertType::HealthDrop));
    }

    #[tokio::test]
    async fn test_tail_spike_alert_and_protection() {
        let fixture = fixture();
        fixture.tail_risk.set(btc(), 0.45);

        let run = fixture.pipeline.run(Trigger::Manual, "worker-1").await.unwrap();
        assert_eq!(run.status, RunStatus::Success);

        // Tail in [0.40, 0.55): governance froze the symbol.
        let state = fixture.governance.get(&btc(), fixture.clock.now());
        assert_eq!(state.mode, GovernanceMode::FrozenOnly);
        assert_eq!(state.frozen_policy_hash.as_deref(), Some("policy-1"));

        assert!(fixture
            .sink
            .delivered()
            .iter()
            .any(|e| e.alert_type == AlertType::TailSpike));
    }

    /// Model source that requests cancellation of the running job while
    /// the snapshot-write step is in flight.
    struct CancellingSource {
        scheduler: Arc<Scheduler>,
    }

    impl ModelOutputSource for CancellingSource {
        fn outputs_for(
            &self,
            _symbol: &Symbol,
            _as_of: DateTime<Utc>,
        ) -> crate::ports::BoxFuture<'_, Vec<ModelOutput>> {
            let running = self
                .scheduler
                .list_runs("daily-run")
                .into_iter()
                .find(|run| run.status == RunStatus::Running);
            if let Some(run) = running {
                self.scheduler.request_cancel(&run.run_id).unwrap();
            }
            Box::pin(async move { Vec::new() })
        }
    }

    #[tokio::test]
    async fn test_cancellation_skips_remaining_steps() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let outcomes = Arc::new(MemoryOutcomeStore::new());
        let oracle = Arc::new(FixedPriceOracle::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let scheduler = Arc::new(Scheduler::new());

        let pipeline = DailyPipeline::new(
            outcomes.clone(),
            SnapshotWriter::new(snapshots.clone(), "policy-1", "engine-v1"),
            OutcomeTracker::new(
                snapshots.clone(),
                outcomes.clone(),
                oracle,
                clock.clone(),
                TrackerConfig::default(),
            ),
            Arc::new(CancellingSource {
                scheduler: scheduler.clone(),
            }),
            Arc::new(AlwaysOkIntegrity::new()),
            Arc::new(StaticTailRisk::new()),
            Arc::new(GovernanceEngine::new(GovernanceConfig::default())),
            Arc::new(AlertGate::new(AlertPolicyConfig::default())),
            Arc::new(RecordingSink::new()),
            scheduler,
            clock,
            StatsConfig::default(),
            QualityConfig::default(),
            DriftThresholds::default(),
            PipelineConfig {
                job_id: default_job_id(),
                schedule_utc: default_schedule_utc(),
                lease_minutes: default_lease_minutes(),
                symbols: vec![btc()],
                horizons: vec![Horizon::D7],
                presets: vec![Preset::Balanced],
                roles: vec![Role::Active],
                tracker_budget_secs: default_tracker_budget_secs(),
                live_window: default_live_window(),
                baseline_window: default_baseline_window(),
                baseline_label: default_baseline_label(),
            },
        );

        let run = pipeline.run(Trigger::Manual, "worker-1").await.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);

        // Steps 1-2 ran; everything after the cancellation is SKIPPED.
        assert_eq!(run.steps[0].status, vigil_scheduler::StepStatus::Success);
        assert_eq!(run.steps[1].status, vigil_scheduler::StepStatus::Success);
        for step in &run.steps[2..] {
            assert_eq!(step.status, vigil_scheduler::StepStatus::Skipped);
            assert_eq!(step.note.as_deref(), Some("run cancelled"));
        }
    }

    #[tokio::test]
    async fn test_shadow_outcomes_do_not_drive_governance() {
        let fixture = fixture();
        // 12 SHADOW losses; governance must stay NORMAL.
        for i in 0..12 {
            let resolved_at = t0() - Duration::days((12 - i) as i64);
            fixture
                .outcomes
                .put(ForecastOutcome {
                    snapshot_ref: format!("shadow-{i}"),
                    symbol: btc(),
                    horizon: Horizon::D7,
                    preset: Preset::Balanced,
                    role: Role::Shadow,
                    policy_hash: "policy-1".to_string(),
                    start_price: Price::new(dec!(68000)),
                    target_price: Price::new(dec!(69224)),
                    real_price: Price::new(dec!(66000)),
                    result: ForecastResult::Loss,
                    direction_correct: false,
                    deviation: 0.02,
                    realized_move_pct: -0.029,
                    realized_return: -0.029,
                    confidence: 0.7,
                    created_at: resolved_at - Duration::days(7),
                    resolved_at,
                })
                .unwrap();
        }

        for day in 0..3 {
            fixture.clock.set(t0() + Duration::days(day));
            fixture.pipeline.run(Trigger::Cron, "worker-1").await.unwrap();
        }

        let state = fixture.governance.get(&btc(), fixture.clock.now());
        assert_eq!(state.mode, GovernanceMode::Normal);
    }
}
