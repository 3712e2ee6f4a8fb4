//! Scheduler registry: lease acquisition and run bookkeeping.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SchedulerError, SchedulerResult};
use crate::run::{JobRun, RunStatus, StepRecord, Trigger};
use crate::state::{compute_next_run, JobLock, JobState};

/// A successfully acquired run: the caller holds the lease until it calls
/// [`Scheduler::finish`] or the lease expires.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredRun {
    pub run_id: String,
    pub job_id: String,
    pub owner: String,
}

#[derive(Default)]
struct SchedulerInner {
    jobs: HashMap<String, JobState>,
    runs: HashMap<String, JobRun>,
    /// Run ids in creation order, for bounded history queries.
    run_order: Vec<String>,
}

/// Scheduler registry.
///
/// All mutations go through one lock, which makes `begin` the atomic
/// update the lease protocol requires: check `locked_until < now`, write
/// the new lock, and create the RUNNING run record in a single critical
/// section. Losers observe the live lock and get `AlreadyRunning` without
/// producing any run record.
pub struct Scheduler {
    inner: Mutex<SchedulerInner>,
    /// Retained run records per job.
    max_runs: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SchedulerInner::default()),
            max_runs: 256,
        }
    }

    /// Register a job if absent. Idempotent.
    pub fn register_job(&self, job_id: &str, schedule_utc: Option<&str>, enabled: bool) {
        let mut inner = self.inner.lock();
        inner
            .jobs
            .entry(job_id.to_string())
            .or_insert_with(|| JobState::new(job_id, schedule_utc, enabled));
    }

    pub fn enable(&self, job_id: &str) -> SchedulerResult<JobState> {
        self.set_enabled(job_id, true)
    }

    pub fn disable(&self, job_id: &str) -> SchedulerResult<JobState> {
        self.set_enabled(job_id, false)
    }

    fn set_enabled(&self, job_id: &str, enabled: bool) -> SchedulerResult<JobState> {
        let mut inner = self.inner.lock();
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::UnknownJob(job_id.to_string()))?;
        job.enabled = enabled;
        info!(job_id, enabled, "job toggled");
        Ok(job.clone())
    }

    pub fn get_state(&self, job_id: &str) -> SchedulerResult<JobState> {
        self.inner
            .lock()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJob(job_id.to_string()))
    }

    /// Atomically acquire the job lease and write the RUNNING run record.
    ///
    /// Fails with `AlreadyRunning` while another worker's lease is live;
    /// in that case no run record is created. Taking over an expired lease
    /// finalizes the crashed run as FAILED first.
    pub fn begin(
        &self,
        job_id: &str,
        trigger: Trigger,
        owner: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> SchedulerResult<AcquiredRun> {
        let mut inner = self.inner.lock();

        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::UnknownJob(job_id.to_string()))?;
        if !job.enabled {
            return Err(SchedulerError::Disabled(job_id.to_string()));
        }
        if job.is_locked(now) {
            debug!(job_id, owner, "lease held elsewhere, yielding");
            return Err(SchedulerError::AlreadyRunning(job_id.to_string()));
        }

        // A dead lock means the previous run crashed past its lease.
        let stale_run_id = job.lock.take().map(|lock| lock.run_id);

        let run_id = Uuid::new_v4().to_string();
        job.lock = Some(JobLock {
            locked_until: now + lease,
            owner: owner.to_string(),
            run_id: run_id.clone(),
        });

        if let Some(stale_id) = stale_run_id {
            if let Some(stale) = inner.runs.get_mut(&stale_id) {
                if stale.status == RunStatus::Running {
                    warn!(job_id, stale_run = %stale_id, "finalizing crashed run");
                    stale.status = RunStatus::Failed;
                    stale.finished_at = Some(now);
                    stale.summary = Some("lease expired".to_string());
                }
            }
        }

        let run = JobRun {
            run_id: run_id.clone(),
            job_id: job_id.to_string(),
            trigger,
            started_at: now,
            finished_at: None,
            status: RunStatus::Running,
            steps: Vec::new(),
            summary: None,
            cancel_requested: false,
        };
        inner.runs.insert(run_id.clone(), run);
        inner.run_order.push(run_id.clone());

        info!(job_id, %run_id, owner, %trigger, "run started");
        Ok(AcquiredRun {
            run_id,
            job_id: job_id.to_string(),
            owner: owner.to_string(),
        })
    }

    /// Append a step record to a running run.
    pub fn append_step(&self, run_id: &str, step: StepRecord) -> SchedulerResult<()> {
        let mut inner = self.inner.lock();
        let run = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| SchedulerError::UnknownRun(run_id.to_string()))?;
        run.steps.push(step);
        Ok(())
    }

    /// Request cooperative cancellation of a run.
    pub fn request_cancel(&self, run_id: &str) -> SchedulerResult<()> {
        let mut inner = self.inner.lock();
        let run = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| SchedulerError::UnknownRun(run_id.to_string()))?;
        run.cancel_requested = true;
        info!(%run_id, "cancellation requested");
        Ok(())
    }

    pub fn is_cancel_requested(&self, run_id: &str) -> bool {
        self.inner
            .lock()
            .runs
            .get(run_id)
            .map_or(false, |run| run.cancel_requested)
    }

    /// Finalize a run and release the lease.
    ///
    /// The lease is only cleared when this owner still holds it; a run that
    /// outlived its lease must not release a successor's lock.
    pub fn finish(
        &self,
        acquired: &AcquiredRun,
        status: RunStatus,
        summary: Option<&str>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<JobRun> {
        let mut inner = self.inner.lock();

        let run = inner
            .runs
            .get_mut(&acquired.run_id)
            .ok_or_else(|| SchedulerError::UnknownRun(acquired.run_id.clone()))?;
        run.status = status;
        run.finished_at = Some(now);
        run.summary = summary.map(str::to_string);
        let finished = run.clone();

        if let Some(job) = inner.jobs.get_mut(&acquired.job_id) {
            job.last_run_at = Some(now);
            job.last_status = Some(status);
            let owns_lock = job
                .lock
                .as_ref()
                .map_or(false, |lock| lock.run_id == acquired.run_id);
            if owns_lock {
                job.lock = None;
            }
            if let Some(schedule) = job.schedule_utc.clone() {
                job.next_run_at = compute_next_run(&schedule, now).ok();
            }
        }

        // Trim run history.
        if inner.run_order.len() > self.max_runs {
            let trim_to = inner.run_order.len() - self.max_runs;
            let excess: Vec<String> = inner
                .run_order
                .drain(..trim_to)
                .collect();
            for run_id in excess {
                inner.runs.remove(&run_id);
            }
        }

        info!(
            job_id = %acquired.job_id,
            run_id = %acquired.run_id,
            status = %status,
            "run finished"
        );
        Ok(finished)
    }

    pub fn get_run(&self, run_id: &str) -> Option<JobRun> {
        self.inner.lock().runs.get(run_id).cloned()
    }

    /// Runs for a job, oldest first.
    pub fn list_runs(&self, job_id: &str) -> Vec<JobRun> {
        let inner = self.inner.lock();
        inner
            .run_order
            .iter()
            .filter_map(|id| inner.runs.get(id))
            .filter(|run| run.job_id == job_id)
            .cloned()
            .collect()
    }

    /// Jobs whose schedule is due at `now` and not locked. Used by the
    /// cron loop.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<String> {
        let inner = self.inner.lock();
        let mut due: Vec<String> = inner
            .jobs
            .values()
            .filter(|job| {
                job.enabled
                    && !job.is_locked(now)
                    && job.next_run_at.map_or(false, |at| at <= now)
            })
            .map(|job| job.job_id.clone())
            .collect();
        due.sort();
        due
    }

    /// Seed `next_run_at` for scheduled jobs that have never run.
    pub fn seed_schedules(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        for job in inner.jobs.values_mut() {
            if job.next_run_at.is_none() {
                if let Some(schedule) = job.schedule_utc.clone() {
                    job.next_run_at = compute_next_run(&schedule, now).ok();
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
