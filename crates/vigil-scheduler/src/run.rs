//! Job run audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    Cron,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron => write!(f, "CRON"),
            Self::Manual => write!(f, "MANUAL"),
        }
    }
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Per-step status inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// One pipeline step's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: i64,
    /// Item count the step reports (snapshots written, outcomes resolved).
    pub count: Option<u64>,
    pub error: Option<String>,
    /// Explanation for SKIPPED steps.
    pub note: Option<String>,
}

impl StepRecord {
    pub fn success(name: &str, duration_ms: i64, count: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Success,
            duration_ms,
            count,
            error: None,
            note: None,
        }
    }

    pub fn failed(name: &str, duration_ms: i64, error: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Failed,
            duration_ms,
            count: None,
            error: Some(error.to_string()),
            note: None,
        }
    }

    pub fn skipped(name: &str, note: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            count: None,
            error: None,
            note: Some(note.to_string()),
        }
    }
}

/// Audit record of one job run. Append-only once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub run_id: String,
    pub job_id: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub summary: Option<String>,
    /// Cooperative cancellation flag; steps check it at stage boundaries.
    pub cancel_requested: bool,
}

impl JobRun {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
