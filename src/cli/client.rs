use anyhow::{Result, anyhow};
use reqwest::Client;

use crate::core::config::{DEFAULT_API_HOST, DEFAULT_API_PORT};
use crate::core::terminal::{GuideSection, print_error, print_success, status_badge};

/// Send one API request built from the command line and render the reply.
pub async fn run_client_command(args: &[String]) -> Result<()> {
    let api_url = parse_api_url(args);
    let plan = build_request_plan(args)?;
    let client = Client::new();
    let url = format!("{}{}", api_url.trim_end_matches('/'), plan.path);

    let request = match plan.method {
        HttpMethod::Get => client.get(&url),
        HttpMethod::Post => client.post(&url),
        HttpMethod::Delete => client.delete(&url),
    };
    let request = if let Some(body) = &plan.body {
        request.json(body)
    } else {
        request
    };

    let resp = request
        .send()
        .await
        .map_err(|e| anyhow!("could not reach qaflow at {}: {}", api_url, e))?;
    let status = resp.status();
    let body = resp.json::<serde_json::Value>().await?;
    let ok = body
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(status.is_success());

    if !ok {
        let message = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("request failed");
        print_error(&format!("{} ({})", message, status));
        return Ok(());
    }

    if let Some(message) = body.get("message").and_then(|v| v.as_str()) {
        print_success(message);
    } else {
        print_success("request completed");
    }

    match plan.view {
        View::Runs => render_runs(&body),
        View::RunDetail => render_run_detail(&body),
        View::Raw => {
            GuideSection::new(&plan.title)
                .text(&serde_json::to_string_pretty(&body)?)
                .print();
        }
    }
    Ok(())
}

fn render_runs(body: &serde_json::Value) {
    let mut section = GuideSection::new("Runs");
    for run in body["runs"].as_array().into_iter().flatten() {
        section = section.status(
            run["id"].as_str().unwrap_or("?"),
            &format!(
                "{} {}/{}",
                status_badge(run["status"].as_str().unwrap_or("?")),
                run["completed_agents"],
                run["total_agents"]
            ),
        );
    }
    section.print();
}

fn render_run_detail(body: &serde_json::Value) {
    let run = &body["run"];
    let mut section = GuideSection::new(&format!("Run {}", run["id"].as_str().unwrap_or("?")))
        .status("Status", &status_badge(run["status"].as_str().unwrap_or("?")))
        .status(
            "Progress",
            &format!("{}/{}", run["completed_agents"], run["total_agents"]),
        );
    if let Some(err) = run["error"].as_str() {
        section = section.status("Error", err);
    }
    if let Some(tx) = run["transaction_hash"].as_str() {
        section = section.status("Ledger", tx);
    }
    section = section.blank();
    for step in body["results"].as_array().into_iter().flatten() {
        section = section.status(
            step["agent_type"].as_str().unwrap_or("?"),
            &format!(
                "{} ({} ms)",
                status_badge(step["status"].as_str().unwrap_or("?")),
                step["execution_time_ms"]
            ),
        );
    }
    section.print();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HttpMethod {
    Get,
    Post,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Raw,
    Runs,
    RunDetail,
}

#[derive(Debug, Clone, PartialEq)]
struct RequestPlan {
    method: HttpMethod,
    path: String,
    body: Option<serde_json::Value>,
    title: String,
    view: View,
}

impl RequestPlan {
    fn new(method: HttpMethod, path: impl Into<String>, title: &str) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            title: title.to_string(),
            view: View::Raw,
        }
    }

    fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    fn view(mut self, view: View) -> Self {
        self.view = view;
        self
    }
}

const VALUE_FLAGS: &[&str] = &["--api-url", "--endpoint", "--branch", "--limit", "--json"];

fn parse_api_url(args: &[String]) -> String {
    parse_string_flag(args, "--api-url")
        .unwrap_or_else(|| format!("http://{}:{}", DEFAULT_API_HOST, DEFAULT_API_PORT))
}

fn parse_string_flag(args: &[String], flag: &str) -> Option<String> {
    let mut i = 2;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().skip(2).any(|a| a == flag)
}

/// Positional arguments after `start`, skipping flags and their values.
fn parse_positional_args(args: &[String], start: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = start;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_FLAGS.contains(&arg) {
            i += 2;
        } else if arg.starts_with("--") {
            i += 1;
        } else {
            out.push(args[i].clone());
            i += 1;
        }
    }
    out
}

fn parse_json_flag(args: &[String]) -> Result<Option<serde_json::Value>> {
    if let Some(raw) = parse_string_flag(args, "--json") {
        let parsed = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid JSON for --json payload: {}", e))?;
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}

fn required(positional: &[String], idx: usize, usage: &str) -> Result<String> {
    positional
        .get(idx)
        .cloned()
        .ok_or_else(|| anyhow!("Usage: qaflow {}", usage))
}

fn build_request_plan(args: &[String]) -> Result<RequestPlan> {
    let command = args.get(1).map(String::as_str).unwrap_or("");
    match command {
        "sweep" => Ok(RequestPlan::new(
            HttpMethod::Post,
            "/api/orchestrate/sweep",
            "Sweep",
        )),
        "trigger" => {
            let positional = parse_positional_args(args, 2);
            let run_id = required(&positional, 0, "trigger <run_id>")?;
            Ok(
                RequestPlan::new(HttpMethod::Post, "/api/orchestrate/trigger", "Trigger")
                    .body(serde_json::json!({ "test_run_id": run_id })),
            )
        }
        "register" => Ok(RequestPlan::new(
            HttpMethod::Post,
            "/api/agents/register",
            "Registration",
        )),
        "clear-data" => Ok(RequestPlan::new(
            HttpMethod::Post,
            "/api/data/clear",
            "Clear data",
        )),
        "agents" => build_agents_plan(args),
        "repos" => build_repos_plan(args),
        "runs" => build_runs_plan(args),
        other => Err(anyhow!("unknown command '{}'", other)),
    }
}

fn build_agents_plan(args: &[String]) -> Result<RequestPlan> {
    let action = args.get(2).map(String::as_str).unwrap_or("list");
    let positional = parse_positional_args(args, 3);
    match action {
        "list" => Ok(RequestPlan::new(HttpMethod::Get, "/api/agents", "Agents")),
        "add" => {
            let usage = "agents add <name> <type> [--endpoint <url>]";
            let name = required(&positional, 0, usage)?;
            let agent_type = required(&positional, 1, usage)?;
            let mut body = serde_json::json!({ "name": name, "type": agent_type });
            if let Some(endpoint) = parse_string_flag(args, "--endpoint") {
                body["endpoint_url"] = serde_json::json!(endpoint);
            }
            Ok(RequestPlan::new(HttpMethod::Post, "/api/agents", "Agent").body(body))
        }
        "remove" => {
            let id = required(&positional, 0, "agents remove <id>")?;
            Ok(RequestPlan::new(
                HttpMethod::Delete,
                format!("/api/agents/{}", id),
                "Agent",
            ))
        }
        other => Err(anyhow!(
            "unknown agents action '{}'. Expected: list, add, remove",
            other
        )),
    }
}

fn build_repos_plan(args: &[String]) -> Result<RequestPlan> {
    let action = args.get(2).map(String::as_str).unwrap_or("list");
    let positional = parse_positional_args(args, 3);
    match action {
        "list" => Ok(RequestPlan::new(
            HttpMethod::Get,
            "/api/repositories",
            "Repositories",
        )),
        "add" => {
            let usage = "repos add <name> <github_url> [--branch <branch>]";
            let name = required(&positional, 0, usage)?;
            let url = required(&positional, 1, usage)?;
            let mut body = serde_json::json!({ "name": name, "github_url": url });
            if let Some(branch) = parse_string_flag(args, "--branch") {
                body["branch"] = serde_json::json!(branch);
            }
            Ok(RequestPlan::new(HttpMethod::Post, "/api/repositories", "Repository").body(body))
        }
        other => Err(anyhow!(
            "unknown repos action '{}'. Expected: list, add",
            other
        )),
    }
}

fn build_runs_plan(args: &[String]) -> Result<RequestPlan> {
    let action = args.get(2).map(String::as_str).unwrap_or("list");
    let positional = parse_positional_args(args, 3);
    match action {
        "list" => {
            let path = match parse_string_flag(args, "--limit") {
                Some(limit) => {
                    let limit: usize = limit
                        .parse()
                        .map_err(|_| anyhow!("--limit expects a number, got '{}'", limit))?;
                    format!("/api/runs?limit={}", limit)
                }
                None => "/api/runs".to_string(),
            };
            Ok(RequestPlan::new(HttpMethod::Get, path, "Runs").view(View::Runs))
        }
        "create" => {
            let repository_id = required(
                &positional,
                0,
                "runs create <repository_id> [--trigger] [--json <metadata>]",
            )?;
            let mut body = serde_json::json!({
                "repository_id": repository_id,
                "trigger": has_flag(args, "--trigger"),
            });
            if let Some(metadata) = parse_json_flag(args)? {
                body["metadata"] = metadata;
            }
            Ok(RequestPlan::new(HttpMethod::Post, "/api/runs", "Run").body(body))
        }
        "show" => {
            let id = required(&positional, 0, "runs show <id>")?;
            Ok(
                RequestPlan::new(HttpMethod::Get, format!("/api/runs/{}", id), "Run")
                    .view(View::RunDetail),
            )
        }
        "cancel" => {
            let id = required(&positional, 0, "runs cancel <id>")?;
            Ok(RequestPlan::new(
                HttpMethod::Post,
                format!("/api/runs/{}/cancel", id),
                "Run",
            ))
        }
        other => Err(anyhow!(
            "unknown runs action '{}'. Expected: list, create, show, cancel",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        std::iter::once("qaflow")
            .chain(raw.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn trigger_posts_run_id() {
        let plan = build_request_plan(&args(&["trigger", "run-1"])).unwrap();
        assert_eq!(plan.method, HttpMethod::Post);
        assert_eq!(plan.path, "/api/orchestrate/trigger");
        assert_eq!(plan.body, Some(serde_json::json!({ "test_run_id": "run-1" })));
    }

    #[test]
    fn trigger_without_id_reports_usage() {
        let err = build_request_plan(&args(&["trigger"])).unwrap_err();
        assert!(err.to_string().contains("trigger <run_id>"));
    }

    #[test]
    fn agents_add_carries_type_and_endpoint() {
        let plan = build_request_plan(&args(&[
            "agents",
            "add",
            "fuzzer",
            "fuzzAgent",
            "--endpoint",
            "http://fuzz.local",
        ]))
        .unwrap();
        assert_eq!(plan.path, "/api/agents");
        let body = plan.body.unwrap();
        assert_eq!(body["type"], "fuzzAgent");
        assert_eq!(body["endpoint_url"], "http://fuzz.local");
    }

    #[test]
    fn runs_create_with_trigger_and_metadata() {
        let plan = build_request_plan(&args(&[
            "runs",
            "create",
            "repo-1",
            "--trigger",
            "--json",
            r#"{"requested_by":"ci"}"#,
        ]))
        .unwrap();
        let body = plan.body.unwrap();
        assert_eq!(body["repository_id"], "repo-1");
        assert_eq!(body["trigger"], true);
        assert_eq!(body["metadata"]["requested_by"], "ci");
    }

    #[test]
    fn runs_list_honours_limit_and_api_url() {
        let raw = args(&["runs", "list", "--limit", "5", "--api-url", "http://h:1"]);
        let plan = build_request_plan(&raw).unwrap();
        assert_eq!(plan.method, HttpMethod::Get);
        assert_eq!(plan.path, "/api/runs?limit=5");
        assert_eq!(plan.view, View::Runs);
        assert_eq!(parse_api_url(&raw), "http://h:1");
        assert_eq!(parse_api_url(&args(&["sweep"])), "http://127.0.0.1:17890");
    }

    #[test]
    fn runs_cancel_and_show_routes() {
        let cancel = build_request_plan(&args(&["runs", "cancel", "r9"])).unwrap();
        assert_eq!(cancel.path, "/api/runs/r9/cancel");
        let show = build_request_plan(&args(&["runs", "show", "r9"])).unwrap();
        assert_eq!(show.path, "/api/runs/r9");
        assert_eq!(show.view, View::RunDetail);
    }

    #[test]
    fn invalid_json_payload_is_rejected() {
        let err =
            build_request_plan(&args(&["runs", "create", "repo-1", "--json", "{oops"])).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn unknown_actions_are_errors() {
        assert!(build_request_plan(&args(&["repos", "delete", "x"])).is_err());
        assert!(build_request_plan(&args(&["bogus"])).is_err());
    }
}
