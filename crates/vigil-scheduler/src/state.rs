//! Job state records and schedule math.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};
use crate::run::RunStatus;

/// Lease lock on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLock {
    /// Lease expiry; a lock past this instant is dead and may be taken.
    pub locked_until: DateTime<Utc>,
    /// Unique owner tag of the worker holding the lease.
    pub owner: String,
    /// Run the lease was acquired for.
    pub run_id: String,
}

/// Persistent scheduler state for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub enabled: bool,
    /// Daily UTC schedule as "HH:MM"; `None` for manual-only jobs.
    pub schedule_utc: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<RunStatus>,
    pub lock: Option<JobLock>,
}

impl JobState {
    pub fn new(job_id: &str, schedule_utc: Option<&str>, enabled: bool) -> Self {
        Self {
            job_id: job_id.to_string(),
            enabled,
            schedule_utc: schedule_utc.map(str::to_string),
            next_run_at: None,
            last_run_at: None,
            last_status: None,
            lock: None,
        }
    }

    /// Whether the lock is live at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock
            .as_ref()
            .map_or(false, |lock| lock.locked_until > now)
    }
}

/// Next occurrence of a daily "HH:MM" UTC schedule strictly after `now`.
pub fn compute_next_run(schedule_utc: &str, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(schedule_utc, "%H:%M").map_err(|e| {
        SchedulerError::InvalidSchedule {
            schedule: schedule_utc.to_string(),
            reason: e.to_string(),
        }
    })?;

    let today = now
        .date_naive()
        .and_time(time)
        .and_utc();
    if today > now {
        Ok(today)
    } else {
        Ok(today + Duration::days(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap();
        let next = compute_next_run("06:30", now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 1, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
        let next = compute_next_run("06:30", now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 2, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_exact_schedule_instant_rolls_forward() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 6, 30, 0).unwrap();
        let next = compute_next_run("06:30", now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 2, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(compute_next_run("25:99", now).is_err());
        assert!(compute_next_run("daily", now).is_err());
    }

    #[test]
    fn test_lock_liveness() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut state = JobState::new("daily-run", Some("06:30"), true);
        assert!(!state.is_locked(now));

        state.lock = Some(JobLock {
            locked_until: now + Duration::minutes(10),
            owner: "worker-1".to_string(),
            run_id: "run-1".to_string(),
        });
        assert!(state.is_locked(now));
        assert!(!state.is_locked(now + Duration::minutes(11)));
    }
}
