use axum::{extract::State, http::StatusCode};
use tracing::warn;

use super::super::AppState;
use super::{ApiResponse, fail, ok};

/// Delete every step result and run. Agents and repositories are kept.
pub async fn clear_data(State(state): State<AppState>) -> ApiResponse {
    match state.store().clear_run_data().await {
        Ok((deleted_results, deleted_runs)) => {
            warn!(
                "Cleared run data: {} step results, {} runs",
                deleted_results, deleted_runs
            );
            ok(serde_json::json!({
                "success": true,
                "message": "All test runs and results deleted",
                "deleted_results": deleted_results,
                "deleted_runs": deleted_runs,
            }))
        }
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
