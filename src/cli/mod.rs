mod client;

use anyhow::Result;
use console::style;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::config::{self, AppConfig};
use crate::core::lifecycle::LifecycleManager;
use crate::core::orchestrator::{Orchestrator, SimulatedSteps, StepExecutor};
use crate::core::registration::RegistrationManager;
use crate::core::store::RecordStore;
use crate::core::terminal::{
    self, GuideSection, print_error, print_info, print_link, print_step, print_warn,
};
use crate::interfaces::web::{ApiServer, ApiServerConfig};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Server")
        .command("serve", "Start the API server and the periodic sweep")
        .print();

    GuideSection::new("Workflow")
        .command("sweep", "Process every queued run")
        .command("trigger <run_id>", "Process a single queued run")
        .command("register", "Register pending agents with the coordination service")
        .command("clear-data", "Delete all runs and step results")
        .print();

    GuideSection::new("Records")
        .command("agents list|add|remove", "Manage testing agents")
        .command("repos list|add", "Manage repositories")
        .command("runs list|create|show|cancel", "Manage test runs")
        .print();

    GuideSection::new("Flags")
        .command("--api-host <host>", "serve: bind address")
        .command("--api-port <port>", "serve: bind port")
        .command("--api-url <url>", "client commands: server to talk to")
        .print();

    println!(
        "\n {} {} <command> [subcommand]\n",
        style("Usage:").bold(),
        style("qaflow").green()
    );
}

pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().unwrap_or(api_port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (api_host, api_port)
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("help");

    match cmd {
        "serve" => serve(&args).await,
        "sweep" | "trigger" | "register" | "clear-data" | "agents" | "repos" | "runs" => {
            client::run_client_command(&args).await
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command '{}'", other));
            print_help();
            Ok(())
        }
    }
}

async fn serve(args: &[String]) -> Result<()> {
    let log_tx = crate::logging::init(false);

    let data_dir = config::data_dir();
    let app_config = AppConfig::load(&data_dir).await?;
    let (api_host, api_port) = parse_api_server_flags(
        args,
        2,
        app_config.server.api_host.clone(),
        app_config.server.api_port,
    );

    let store = RecordStore::open(data_dir.join("qaflow.db")).await?;
    let steps = SimulatedSteps::new(app_config.workflow.git_probe, app_config.workflow.seed);
    let executor = StepExecutor::new(Arc::new(steps), app_config.workflow.step_timeout());
    let orchestrator = Orchestrator::new(store.clone(), executor);
    let registration = RegistrationManager::new(store, &app_config.coordination)?;

    let mut lifecycle = LifecycleManager::new().await?;
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(ApiServerConfig {
        orchestrator: orchestrator.clone(),
        registration,
        log_tx,
        api_host: api_host.clone(),
        api_port,
    }))));
    if let Some(cron) = app_config.workflow.sweep_cron.as_deref() {
        lifecycle.schedule_sweep(cron, orchestrator).await?;
    }

    print_step("Starting qaflow...");
    lifecycle.start().await?;

    terminal::print_banner();
    print_link("API", &format!("http://{}:{}/api/health", api_host, api_port));
    print_info(&format!("Data directory: {}", data_dir.display()));
    match app_config.workflow.sweep_cron.as_deref() {
        Some(cron) => print_info(&format!("Periodic sweep: {}", cron)),
        None => print_warn("No sweep_cron configured; runs are processed on trigger only."),
    }
    println!(
        "\n {} to stop.\n",
        style("Ctrl+C").bold().yellow()
    );

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    terminal::print_goodbye();
    Ok(())
}
