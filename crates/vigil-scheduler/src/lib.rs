//! Cooperative job scheduler.
//!
//! One persistent state record per job id carries the enable flag, the
//! daily UTC schedule, and a lease lock. Acquisition is an atomic
//! compare-and-swap on the lock: only the worker whose update succeeded
//! runs, everyone else yields. A crashed worker's lease expires on its own
//! and the next tick takes over.
//!
//! Every run writes a `JobRun` audit record before starting and appends a
//! step record per stage. At most one RUNNING run exists per job at any
//! instant, and a losing `run_now` call produces no run record at all.

pub mod error;
pub mod run;
pub mod scheduler;
pub mod state;

pub use error::{SchedulerError, SchedulerResult};
pub use run::{JobRun, RunStatus, StepRecord, StepStatus, Trigger};
pub use scheduler::{AcquiredRun, Scheduler};
pub use state::{compute_next_run, JobLock, JobState};
