use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::AppState;
use super::{ApiResponse, fail, ok};
use crate::core::store::types::NewRepository;

/// `scheme://...` URLs, or the scp-like `user@host:path` form git accepts.
fn validate_clone_url(clone_url: &str) -> Result<(), String> {
    if clone_url.starts_with('-') || clone_url.chars().any(char::is_whitespace) {
        return Err(format!("invalid clone_url '{}'", clone_url));
    }
    if url::Url::parse(clone_url).is_ok() {
        return Ok(());
    }
    match clone_url.split_once(':') {
        Some((user_host, path))
            if !path.is_empty()
                && user_host
                    .split_once('@')
                    .is_some_and(|(user, host)| !user.is_empty() && !host.is_empty()) =>
        {
            Ok(())
        }
        _ => Err(format!("invalid clone_url '{}'", clone_url)),
    }
}

fn validate_branch(branch: &str) -> Result<(), String> {
    if branch.trim().is_empty() || branch.starts_with('-') || branch.chars().any(char::is_whitespace) {
        return Err(format!("invalid branch '{}'", branch));
    }
    Ok(())
}

pub async fn list_repositories(State(state): State<AppState>) -> ApiResponse {
    match state.store().list_repositories().await {
        Ok(repositories) => ok(serde_json::json!({ "success": true, "repositories": repositories })),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn create_repository(
    State(state): State<AppState>,
    Json(payload): Json<NewRepository>,
) -> ApiResponse {
    if payload.name.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "name is required");
    }
    if let Err(e) = url::Url::parse(&payload.github_url) {
        return fail(
            StatusCode::BAD_REQUEST,
            format!("invalid github_url '{}': {}", payload.github_url, e),
        );
    }
    if let Some(clone_url) = payload.clone_url.as_deref()
        && let Err(msg) = validate_clone_url(clone_url)
    {
        return fail(StatusCode::BAD_REQUEST, msg);
    }
    if let Some(branch) = payload.branch.as_deref()
        && let Err(msg) = validate_branch(branch)
    {
        return fail(StatusCode::BAD_REQUEST, msg);
    }
    match state.store().create_repository(&payload).await {
        Ok(repository) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "success": true, "repository": repository })),
        ),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn get_repository(Path(id): Path<String>, State(state): State<AppState>) -> ApiResponse {
    match state.store().get_repository(&id).await {
        Ok(Some(repository)) => ok(serde_json::json!({ "success": true, "repository": repository })),
        Ok(None) => fail(StatusCode::NOT_FOUND, "Repository not found"),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Deleting a repository cascades to its runs and their step results.
pub async fn delete_repository(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResponse {
    match state.store().delete_repository(&id).await {
        Ok(true) => ok(serde_json::json!({ "success": true })),
        Ok(false) => fail(StatusCode::NOT_FOUND, "Repository not found"),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_url_forms() {
        assert!(validate_clone_url("https://github.com/acme/demo.git").is_ok());
        assert!(validate_clone_url("ssh://git@github.com/acme/demo.git").is_ok());
        assert!(validate_clone_url("git@github.com:acme/demo.git").is_ok());
        assert!(validate_clone_url("--upload-pack=touch /tmp/x;").is_err());
        assert!(validate_clone_url("github.com acme/demo").is_err());
        assert!(validate_clone_url("git@github.com:").is_err());
    }

    #[test]
    fn branch_forms() {
        assert!(validate_branch("main").is_ok());
        assert!(validate_branch("release/1.2").is_ok());
        assert!(validate_branch("-x").is_err());
        assert!(validate_branch("two words").is_err());
        assert!(validate_branch("").is_err());
    }
}
