use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;

use super::super::AppState;
use super::{ApiResponse, fail, ok};
use crate::core::orchestrator::StepKind;
use crate::core::store::types::{AgentPatch, AgentStatus, NewAgent};

fn validate_type(agent_type: &str) -> Result<(), ApiResponse> {
    if StepKind::from_agent_type(agent_type).is_none() {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            format!("unknown agent type '{}'", agent_type),
        ));
    }
    Ok(())
}

fn validate_status(status: Option<&str>) -> Result<(), ApiResponse> {
    match status {
        Some(s) if AgentStatus::from_status(s).is_none() => Err(fail(
            StatusCode::BAD_REQUEST,
            format!("unknown agent status '{}'", s),
        )),
        _ => Ok(()),
    }
}

pub async fn list_agents(State(state): State<AppState>) -> ApiResponse {
    match state.store().list_agents().await {
        Ok(agents) => ok(serde_json::json!({ "success": true, "agents": agents })),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn create_agent(
    State(state): State<AppState>,
    Json(payload): Json<NewAgent>,
) -> ApiResponse {
    if payload.name.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "name is required");
    }
    if let Err(resp) = validate_type(&payload.agent_type)
        .and_then(|_| validate_status(payload.status.as_deref()))
    {
        return resp;
    }
    match state.store().create_agent(&payload).await {
        Ok(agent) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "success": true, "agent": agent })),
        ),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn get_agent(Path(id): Path<String>, State(state): State<AppState>) -> ApiResponse {
    match state.store().get_agent(&id).await {
        Ok(Some(agent)) => {
            let registrations = state
                .store()
                .list_registrations(&id)
                .await
                .unwrap_or_default();
            ok(serde_json::json!({
                "success": true,
                "agent": agent,
                "registrations": registrations,
            }))
        }
        Ok(None) => fail(StatusCode::NOT_FOUND, "Agent not found"),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn update_agent(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(patch): Json<AgentPatch>,
) -> ApiResponse {
    if let Some(t) = patch.agent_type.as_deref()
        && let Err(resp) = validate_type(t)
    {
        return resp;
    }
    if let Err(resp) = validate_status(patch.status.as_deref()) {
        return resp;
    }
    match state.store().update_agent(&id, &patch).await {
        Ok(Some(agent)) => ok(serde_json::json!({ "success": true, "agent": agent })),
        Ok(None) => fail(StatusCode::NOT_FOUND, "Agent not found"),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn delete_agent(Path(id): Path<String>, State(state): State<AppState>) -> ApiResponse {
    match state.store().delete_agent(&id).await {
        Ok(true) => ok(serde_json::json!({ "success": true })),
        Ok(false) => fail(StatusCode::NOT_FOUND, "Agent not found"),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Register every agent without an external id with the coordination service.
pub async fn register_agents(State(state): State<AppState>) -> ApiResponse {
    match state.registration.register_pending_agents().await {
        Ok(results) => {
            let registered = results.iter().filter(|r| r.status == "registered").count();
            ok(serde_json::json!({
                "success": true,
                "message": format!("Registered {} of {} agents", registered, results.len()),
                "results": results,
            }))
        }
        Err(e) => {
            error!("Agent registration failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
