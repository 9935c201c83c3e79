mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

pub use router::build_api_router;

use crate::core::lifecycle::LifecycleComponent;
use crate::core::orchestrator::Orchestrator;
use crate::core::registration::RegistrationManager;
use crate::core::store::RecordStore;

pub struct ApiServer {
    state: AppState,
    api_host: String,
    api_port: u16,
}

pub struct ApiServerConfig {
    pub orchestrator: Orchestrator,
    pub registration: RegistrationManager,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub api_host: String,
    pub api_port: u16,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) registration: RegistrationManager,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) api_port: u16,
}

impl AppState {
    pub(crate) fn store(&self) -> &RecordStore {
        self.orchestrator.store()
    }
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                orchestrator: config.orchestrator,
                registration: config.registration,
                log_tx: config.log_tx,
                api_port: config.api_port,
            },
            api_host: config.api_host,
            api_port: config.api_port,
        }
    }
}

/// Server-sent events carrying every formatted log line.
async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let app = router::build_api_router(self.state.clone());

        tokio::spawn(async move {
            info!("qaflow API listening on http://{addr}");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("qaflow API stopped unexpectedly: {}", e);
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server shutting down...");
        Ok(())
    }
}
