use axum::{Json, extract::State, http::StatusCode};
use tracing::error;

use super::super::AppState;
use super::{ApiResponse, fail, ok};
use crate::core::orchestrator::TriggerError;

#[derive(serde::Deserialize)]
pub struct TriggerRequest {
    pub test_run_id: String,
}

/// Run one queued run now instead of waiting for the next sweep.
pub async fn trigger_run(
    State(state): State<AppState>,
    Json(payload): Json<TriggerRequest>,
) -> ApiResponse {
    let run_id = payload.test_run_id.trim();
    if run_id.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "test_run_id is required");
    }

    match state.orchestrator.trigger(run_id).await {
        Ok(report) => ok(serde_json::json!({
            "success": true,
            "message": format!("Orchestrator processed run {}", run_id),
            "orchestrator_result": report,
        })),
        Err(e @ TriggerError::NotFound(_)) => fail(StatusCode::NOT_FOUND, e),
        Err(e) => {
            error!("Trigger for run {} failed: {}", run_id, e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

pub async fn sweep_runs(State(state): State<AppState>) -> ApiResponse {
    match state.orchestrator.process_queued_runs().await {
        Ok(report) => ok(serde_json::json!({
            "success": true,
            "message": format!("Processed {} queued runs", report.results.len()),
            "roster_mode": report.roster_mode,
            "roster_size": report.roster_size,
            "results": report.results,
        })),
        Err(e) => {
            error!("Sweep failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
