use axum::{
    Json, Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{agents, data, orchestrate, repositories, runs};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/logs", get(super::sse_logs_endpoint))
        .route("/api/orchestrate/trigger", post(orchestrate::trigger_run))
        .route("/api/orchestrate/sweep", post(orchestrate::sweep_runs))
        .route(
            "/api/agents",
            get(agents::list_agents).post(agents::create_agent),
        )
        .route("/api/agents/register", post(agents::register_agents))
        .route(
            "/api/agents/{id}",
            get(agents::get_agent)
                .patch(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route(
            "/api/repositories",
            get(repositories::list_repositories).post(repositories::create_repository),
        )
        .route(
            "/api/repositories/{id}",
            get(repositories::get_repository).delete(repositories::delete_repository),
        )
        .route("/api/runs", get(runs::list_runs).post(runs::create_run))
        .route("/api/runs/{id}", get(runs::get_run))
        .route("/api/runs/{id}/cancel", post(runs::cancel_run))
        .route("/api/data/clear", post(data::clear_data))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.api_port))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}
