pub mod agents;
pub mod data;
pub mod orchestrate;
pub mod repositories;
pub mod runs;

use axum::{Json, http::StatusCode};

pub(crate) type ApiResponse = (StatusCode, Json<serde_json::Value>);

pub(crate) fn ok(body: serde_json::Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

pub(crate) fn fail(status: StatusCode, error: impl std::fmt::Display) -> ApiResponse {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": error.to_string() })),
    )
}
