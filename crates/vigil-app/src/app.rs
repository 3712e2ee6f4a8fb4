//! Application wiring.
//!
//! Builds the stores, engines, and pipeline from configuration and exposes
//! the admin command surface. All state flows through the injected ports;
//! deployments plug their own model source, integrity checker, tail-risk
//! estimator, and alert transport.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use vigil_alerts::{AlertEvent, AlertGate, AlertSink, SendReceipt};
use vigil_core::{
    Clock, CohortKey, GovernanceMode, Horizon, Preset, Price, Role, Symbol, SystemClock,
};
use vigil_governance::{GovernanceEngine, GovernanceState};
use vigil_oracle::HistoricalPriceOracle;
use vigil_pipeline::{
    AlwaysOkIntegrity, DailyPipeline, FixedModelOutputSource, IntegrityChecker, ModelOutputSource,
    PipelineConfig, PipelineError, StaticTailRisk, TailRiskSource,
};
use vigil_quality::{compare_cohorts, overall_severity, recommendation_for};
use vigil_resolver::{resolve, GovernanceDirective, ResolvedDecision, ResolverInput};
use vigil_scheduler::{JobState, Scheduler, Trigger};
use vigil_snapshot::{SnapshotWriter, WriteReport};
use vigil_stats::{CohortStats, OutcomeSample};
use vigil_store::{
    JournaledOutcomeStore, JournaledSnapshotStore, MemoryOutcomeStore, MemorySnapshotStore,
    OutcomeFilter, OutcomeStore, SnapshotStore,
};
use vigil_tracker::{OutcomeTracker, TrackerReport};

use crate::commands::{DriftReport, RunNowResponse};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Alert sink that only logs; real transports live outside the core.
#[derive(Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn send(&self, event: &AlertEvent) -> vigil_alerts::BoxFuture<'_, SendReceipt> {
        let event = event.clone();
        Box::pin(async move {
            info!(
                symbol = %event.symbol,
                alert_type = %event.alert_type,
                level = %event.level,
                message = %event.message,
                "ALERT"
            );
            SendReceipt::delivered()
        })
    }
}

/// The wired application.
pub struct Application {
    config: AppConfig,
    symbols: Vec<Symbol>,
    clock: Arc<dyn Clock>,
    snapshots: Arc<dyn SnapshotStore>,
    outcomes: Arc<dyn OutcomeStore>,
    oracle: Arc<HistoricalPriceOracle>,
    scheduler: Arc<Scheduler>,
    governance: Arc<GovernanceEngine>,
    model_source: Arc<dyn ModelOutputSource>,
    pipeline: Arc<DailyPipeline>,
    tracker: OutcomeTracker,
    writer: SnapshotWriter,
}

impl Application {
    /// Build with stub collaborator ports (no model source, permissive
    /// integrity, zero tail risk, log-only alerts).
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_ports(
            config,
            Arc::new(FixedModelOutputSource::new()),
            Arc::new(AlwaysOkIntegrity::new()),
            Arc::new(StaticTailRisk::new()),
            Arc::new(LogSink),
        )
    }

    /// Build with injected collaborator ports.
    pub fn with_ports(
        config: AppConfig,
        model_source: Arc<dyn ModelOutputSource>,
        integrity: Arc<dyn IntegrityChecker>,
        tail_risk: Arc<dyn TailRiskSource>,
        sink: Arc<dyn AlertSink>,
    ) -> AppResult<Self> {
        config.validate()?;
        let symbols = config.parsed_symbols()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (snapshots, outcomes): (Arc<dyn SnapshotStore>, Arc<dyn OutcomeStore>) =
            match &config.journal_dir {
                Some(dir) => (
                    Arc::new(JournaledSnapshotStore::new(MemorySnapshotStore::new(), dir)),
                    Arc::new(JournaledOutcomeStore::new(MemoryOutcomeStore::new(), dir)),
                ),
                None => (
                    Arc::new(MemorySnapshotStore::new()),
                    Arc::new(MemoryOutcomeStore::new()),
                ),
            };

        let oracle = Arc::new(HistoricalPriceOracle::new());
        let scheduler = Arc::new(Scheduler::new());
        let governance = Arc::new(GovernanceEngine::new(config.governance.clone()));
        let gate = Arc::new(AlertGate::new(config.alerts.clone()));

        let writer = SnapshotWriter::new(
            snapshots.clone(),
            &config.policy_hash,
            &config.engine_version,
        );
        let tracker = OutcomeTracker::new(
            snapshots.clone(),
            outcomes.clone(),
            oracle.clone(),
            clock.clone(),
            config.tracker.clone(),
        );

        let pipeline_config = PipelineConfig {
            job_id: "daily-run".to_string(),
            schedule_utc: config.schedule.daily_utc.clone(),
            lease_minutes: config.schedule.pipeline_lease_minutes,
            symbols: symbols.clone(),
            horizons: Horizon::ALL.to_vec(),
            presets: vec![Preset::Conservative, Preset::Balanced, Preset::Aggressive],
            roles: vec![Role::Active, Role::Shadow],
            tracker_budget_secs: config.schedule.tracker_budget_secs,
            live_window: config.stats.window_size,
            baseline_window: 200,
            baseline_label: "BASELINE-FULL".to_string(),
        };

        let pipeline = Arc::new(DailyPipeline::new(
            outcomes.clone(),
            SnapshotWriter::new(
                snapshots.clone(),
                &config.policy_hash,
                &config.engine_version,
            ),
            OutcomeTracker::new(
                snapshots.clone(),
                outcomes.clone(),
                oracle.clone(),
                clock.clone(),
                config.tracker.clone(),
            ),
            model_source.clone(),
            integrity,
            tail_risk,
            governance.clone(),
            gate,
            sink,
            scheduler.clone(),
            clock.clone(),
            config.stats.clone(),
            config.quality.clone(),
            config.drift.clone(),
            pipeline_config,
        ));

        scheduler.seed_schedules(clock.now());

        Ok(Self {
            config,
            symbols,
            clock,
            snapshots,
            outcomes,
            oracle,
            scheduler,
            governance,
            model_source,
            pipeline,
            tracker,
            writer,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn pipeline(&self) -> &Arc<DailyPipeline> {
        &self.pipeline
    }

    /// Ingest a daily close into the price oracle.
    pub fn ingest_bar(&self, symbol: &Symbol, ts: DateTime<Utc>, close: Price) {
        self.oracle.insert_bar(symbol.clone(), ts, close);
    }

    fn require_symbol(&self, raw: &str) -> AppResult<Symbol> {
        let symbol = Symbol::new(raw)?;
        if !self.symbols.contains(&symbol) {
            return Err(AppError::UnknownSymbol(raw.to_string()));
        }
        Ok(symbol)
    }

    /// `snapshot.create`: write the day's snapshots for a symbol, limited
    /// to the requested grid.
    pub async fn snapshot_create(
        &self,
        symbol: &str,
        horizons: &[Horizon],
        presets: &[Preset],
        roles: &[Role],
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<WriteReport> {
        let symbol = self.require_symbol(symbol)?;
        let as_of = as_of.unwrap_or_else(|| self.clock.now());

        let outputs: Vec<_> = self
            .model_source
            .outputs_for(&symbol, as_of)
            .await
            .into_iter()
            .filter(|o| {
                (horizons.is_empty() || horizons.contains(&o.horizon))
                    && (presets.is_empty() || presets.contains(&o.preset))
                    && (roles.is_empty() || roles.contains(&o.role))
            })
            .collect();

        Ok(self.writer.write_bundle(&symbol, &outputs, as_of)?)
    }

    /// `snapshot.list`: read-only snapshot listing, newest first.
    pub fn snapshot_list(
        &self,
        symbol: Option<&str>,
        status: Option<vigil_core::EvaluationStatus>,
        limit: usize,
    ) -> AppResult<Vec<vigil_core::ForecastSnapshot>> {
        let filter = vigil_store::SnapshotFilter {
            symbol: match symbol {
                Some(raw) => Some(self.require_symbol(raw)?),
                None => None,
            },
            status,
            ..vigil_store::SnapshotFilter::default()
        };
        Ok(self.snapshots.list(&filter, limit)?)
    }

    /// `outcome.resolveDue`: resolve due snapshots, optionally narrowed to
    /// one symbol.
    pub async fn outcome_resolve_due(&self, symbol: Option<&str>) -> AppResult<TrackerReport> {
        let symbol = match symbol {
            Some(raw) => Some(self.require_symbol(raw)?),
            None => None,
        };
        Ok(self.tracker.run_once_for(symbol.as_ref()).await?)
    }

    /// `stats.query`: recompute cohort statistics from the outcome store.
    pub fn stats_query(
        &self,
        symbol: &str,
        horizon: Horizon,
        preset: Preset,
        role: Role,
        window: Option<usize>,
    ) -> AppResult<CohortStats> {
        let symbol = self.require_symbol(symbol)?;
        let key = CohortKey::new(symbol, horizon, preset, role);
        let window = window.unwrap_or(self.config.stats.window_size);

        let outcomes = self.outcomes.query(&OutcomeFilter::cohort(&key), window)?;
        let samples: Vec<OutcomeSample> = outcomes.iter().map(OutcomeSample::from).collect();
        Ok(CohortStats::compute(
            &samples,
            &self.config.stats,
            self.clock.now(),
        ))
    }

    /// `drift.query`: LIVE-vs-baseline comparisons across the symbol's
    /// ACTIVE cohorts, optionally scoped to one horizon.
    pub fn drift_query(&self, symbol: &str, scope: Option<Horizon>) -> AppResult<DriftReport> {
        let symbol = self.require_symbol(symbol)?;
        let now = self.clock.now();
        let mut comparisons = Vec::new();

        for horizon in Horizon::ALL {
            if scope.is_some_and(|scoped| scoped != horizon) {
                continue;
            }
            for preset in [Preset::Conservative, Preset::Balanced, Preset::Aggressive] {
                let key = CohortKey::new(symbol.clone(), horizon, preset, Role::Active);
                let outcomes = self.outcomes.query(&OutcomeFilter::cohort(&key), 200)?;
                if outcomes.is_empty() {
                    continue;
                }
                let samples: Vec<OutcomeSample> =
                    outcomes.iter().map(OutcomeSample::from).collect();
                let baseline = CohortStats::compute(&samples, &self.config.stats, now);
                let live_start = samples
                    .len()
                    .saturating_sub(self.config.stats.window_size);
                let live = CohortStats::compute(&samples[live_start..], &self.config.stats, now);

                comparisons.push(compare_cohorts(
                    &format!("{}/{}", horizon, preset),
                    &live,
                    &baseline,
                    &self.config.drift,
                ));
            }
        }

        let overall = overall_severity(&comparisons);
        Ok(DriftReport {
            per_comparison: comparisons,
            overall_severity: overall,
            recommendation: recommendation_for(overall),
        })
    }

    /// `governance.get`.
    pub fn governance_get(&self, symbol: &str) -> AppResult<GovernanceState> {
        let symbol = self.require_symbol(symbol)?;
        Ok(self.governance.get(&symbol, self.clock.now()))
    }

    /// `governance.override`: admin sets a mode directly, with audit.
    pub fn governance_override(
        &self,
        symbol: &str,
        mode: GovernanceMode,
        actor: &str,
    ) -> AppResult<GovernanceState> {
        let symbol = self.require_symbol(symbol)?;
        let now = self.clock.now();
        self.governance
            .override_mode(&symbol, mode, now, &format!("override by {}", actor));
        Ok(self.governance.get(&symbol, now))
    }

    /// `scheduler.enable`.
    pub fn scheduler_enable(&self, job_id: &str) -> AppResult<JobState> {
        Ok(self.scheduler.enable(job_id)?)
    }

    /// `scheduler.disable`.
    pub fn scheduler_disable(&self, job_id: &str) -> AppResult<JobState> {
        Ok(self.scheduler.disable(job_id)?)
    }

    /// `scheduler.runNow`: trigger a job immediately. A losing race
    /// reports `already-running` rather than failing.
    pub async fn scheduler_run_now(&self, job_id: &str, trigger: Trigger) -> AppResult<RunNowResponse> {
        match job_id {
            "daily-run" => {
                let owner = format!("manual-{}", Uuid::new_v4());
                match self.pipeline.run(trigger, &owner).await {
                    Ok(run) => Ok(RunNowResponse {
                        status: "completed".to_string(),
                        run: Some(run),
                    }),
                    Err(PipelineError::AlreadyRunning(_)) => Ok(RunNowResponse {
                        status: "already-running".to_string(),
                        run: None,
                    }),
                    Err(err) => Err(err.into()),
                }
            }
            job_id if job_id == self.tracker.config().job_id => {
                let owner = format!("manual-{}", Uuid::new_v4());
                match self.tracker.run_with_lease(&self.scheduler, &owner).await? {
                    Some(_) => Ok(RunNowResponse {
                        status: "completed".to_string(),
                        run: self.scheduler.list_runs(job_id).into_iter().last(),
                    }),
                    None => Ok(RunNowResponse {
                        status: "already-running".to_string(),
                        run: None,
                    }),
                }
            }
            unknown => Err(AppError::Scheduler(
                vigil_scheduler::SchedulerError::UnknownJob(unknown.to_string()),
            )),
        }
    }

    /// `resolver.query`: resolve a decision for a symbol with the live
    /// governance directive injected. For pure simulation, call the
    /// resolver crate directly with a directive of your choosing.
    pub fn resolver_query(
        &self,
        symbol: &str,
        mut input: ResolverInput,
    ) -> AppResult<ResolvedDecision> {
        let symbol = self.require_symbol(symbol)?;
        let state = self.governance.get(&symbol, self.clock.now());
        input.governance = GovernanceDirective {
            mode: state.mode,
            frozen_policy_hash: state.frozen_policy_hash,
        };
        Ok(resolve(&input, &self.config.resolver)?)
    }
}
