//! Admin command response envelope.
//!
//! Every admin query returns a well-formed response: either the requested
//! payload with `status = "ok"` or a structured error with a stable code
//! and a human-readable reason. `action = AVOID` is a normal payload, not
//! an error.

use serde::Serialize;
use serde_json::{json, Value};
use vigil_quality::{DriftComparison, DriftRecommendation, DriftSeverity};
use vigil_scheduler::JobRun;

use crate::error::AppError;

/// `drift.query` payload.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub per_comparison: Vec<DriftComparison>,
    pub overall_severity: DriftSeverity,
    pub recommendation: DriftRecommendation,
}

/// `scheduler.runNow` payload.
#[derive(Debug, Clone, Serialize)]
pub struct RunNowResponse {
    /// "completed" or "already-running".
    pub status: String,
    pub run: Option<JobRun>,
}

/// Stable error code for an application error.
pub fn error_code(err: &AppError) -> &'static str {
    match err {
        AppError::Config(_) => "misconfiguration",
        AppError::UnknownSymbol(_) | AppError::Core(_) => "contract_violation",
        AppError::Snapshot(vigil_snapshot::SnapshotError::InvalidSnapshotInput(_)) => {
            "contract_violation"
        }
        AppError::Resolver(_) => "contract_violation",
        AppError::Store(err) if err.is_concurrency_loss() => "concurrency",
        AppError::Scheduler(err) if err.is_concurrency_loss() => "concurrency",
        AppError::Pipeline(vigil_pipeline::PipelineError::AlreadyRunning(_)) => "concurrency",
        AppError::Store(_) | AppError::Snapshot(_) | AppError::Tracker(_) => "transient",
        AppError::Scheduler(_) | AppError::Pipeline(_) | AppError::Telemetry(_) => "fatal",
    }
}

/// Wrap a command result in the response envelope.
pub fn respond<T: Serialize>(result: Result<T, AppError>) -> Value {
    match result {
        Ok(value) => json!({
            "status": "ok",
            "value": value,
        }),
        Err(err) => json!({
            "status": "error",
            "error": {
                "code": error_code(&err),
                "reason": err.to_string(),
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope() {
        let response = respond(Ok(42u32));
        assert_eq!(response["status"], "ok");
        assert_eq!(response["value"], 42);
    }

    #[test]
    fn test_error_envelope_carries_code_and_reason() {
        let response: Value = respond::<u32>(Err(AppError::UnknownSymbol("XYZ".to_string())));
        assert_eq!(response["status"], "error");
        assert_eq!(response["error"]["code"], "contract_violation");
        assert!(response["error"]["reason"]
            .as_str()
            .unwrap()
            .contains("XYZ"));
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            error_code(&AppError::Config("bad".to_string())),
            "misconfiguration"
        );
        assert_eq!(
            error_code(&AppError::Pipeline(
                vigil_pipeline::PipelineError::AlreadyRunning("daily-run".to_string())
            )),
            "concurrency"
        );
        assert_eq!(
            error_code(&AppError::Store(vigil_store::StoreError::AlreadyResolved(
                "fp".to_string()
            ))),
            "concurrency"
        );
        assert_eq!(
            error_code(&AppError::Store(vigil_store::StoreError::NotFound(
                "fp".to_string()
            ))),
            "transient"
        );
    }
}
