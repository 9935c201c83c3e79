use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::warn;

use super::super::AppState;
use super::{ApiResponse, fail, ok};
use crate::core::orchestrator::WORKFLOW_SEQUENCE;

#[derive(serde::Deserialize)]
pub struct RunsQuery {
    pub limit: Option<usize>,
}

#[derive(serde::Deserialize)]
pub struct CreateRunRequest {
    pub repository_id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Process the run right away instead of waiting for a sweep.
    #[serde(default)]
    pub trigger: bool,
}

pub async fn list_runs(State(state): State<AppState>, Query(query): Query<RunsQuery>) -> ApiResponse {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match state.store().list_runs(limit).await {
        Ok(runs) => ok(serde_json::json!({ "success": true, "runs": runs })),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn create_run(
    State(state): State<AppState>,
    Json(payload): Json<CreateRunRequest>,
) -> ApiResponse {
    match state.store().get_repository(&payload.repository_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return fail(StatusCode::NOT_FOUND, "Repository not found"),
        Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }

    let total = WORKFLOW_SEQUENCE.len() as i64;
    let run = match state
        .store()
        .create_run(&payload.repository_id, total, payload.metadata.as_ref())
        .await
    {
        Ok(run) => run,
        Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    let mut body = serde_json::json!({ "success": true, "run": run });
    if payload.trigger {
        match state.orchestrator.trigger(&run.id).await {
            Ok(report) => body["orchestrator_result"] = serde_json::json!(report),
            Err(e) => {
                warn!("Immediate trigger of run {} failed: {}", run.id, e);
                body["trigger_error"] = serde_json::json!(e.to_string());
            }
        }
        if let Ok(Some(updated)) = state.store().get_run(&run.id).await {
            body["run"] = serde_json::json!(updated);
        }
    }
    (StatusCode::CREATED, Json(body))
}

/// A run together with its step results.
pub async fn get_run(Path(id): Path<String>, State(state): State<AppState>) -> ApiResponse {
    let run = match state.store().get_run(&id).await {
        Ok(Some(run)) => run,
        Ok(None) => return fail(StatusCode::NOT_FOUND, "Run not found"),
        Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    match state.store().list_step_results(&id).await {
        Ok(results) => ok(serde_json::json!({
            "success": true,
            "run": run,
            "results": results,
        })),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn cancel_run(Path(id): Path<String>, State(state): State<AppState>) -> ApiResponse {
    match state.store().cancel_run(&id).await {
        Ok(true) => ok(serde_json::json!({ "success": true, "message": "Run cancelled" })),
        Ok(false) => match state.store().get_run_status(&id).await {
            Ok(Some(status)) => fail(
                StatusCode::CONFLICT,
                format!("Run is already {}", status),
            ),
            Ok(None) => fail(StatusCode::NOT_FOUND, "Run not found"),
            Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
        },
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
