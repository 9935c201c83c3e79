use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::core::orchestrator::Orchestrator;

#[derive(Debug, PartialEq)]
pub enum LifecycleState {
    Init,
    Ready,
    Shutdown,
}

#[async_trait::async_trait]
pub trait LifecycleComponent {
    async fn on_init(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_start(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct LifecycleManager {
    state: LifecycleState,
    components: Vec<Arc<Mutex<dyn LifecycleComponent + Send + Sync>>>,
    pub scheduler: JobScheduler,
}

impl LifecycleManager {
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            state: LifecycleState::Init,
            components: Vec::new(),
            scheduler,
        })
    }

    pub fn attach(&mut self, component: Arc<Mutex<dyn LifecycleComponent + Send + Sync>>) {
        self.components.push(component);
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Run a queued-run sweep on `cron` (six fields, seconds first).
    pub async fn schedule_sweep(&mut self, cron: &str, orchestrator: Orchestrator) -> Result<uuid::Uuid> {
        let job = Job::new_async(cron, move |_uuid, mut _l| {
            let orch = orchestrator.clone();
            Box::pin(async move {
                match orch.process_queued_runs().await {
                    Ok(report) => {
                        if !report.results.is_empty() {
                            info!("Scheduled sweep processed {} runs", report.results.len());
                        }
                    }
                    Err(e) => error!("Scheduled sweep failed: {}", e),
                }
            })
        })?;
        let id = self.scheduler.add(job).await?;
        info!("Periodic sweep scheduled ({})", cron);
        Ok(id)
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("Lifecycle: initializing {} components", self.components.len());
        self.state = LifecycleState::Init;
        for comp in &self.components {
            comp.lock().await.on_init().await?;
        }

        for comp in &self.components {
            comp.lock().await.on_start().await?;
        }

        info!("Lifecycle: components started, starting sweep scheduler");
        self.scheduler.start().await?;
        self.state = LifecycleState::Ready;

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Lifecycle: shutting down");
        self.state = LifecycleState::Shutdown;

        for comp in &self.components {
            if let Err(e) = comp.lock().await.on_shutdown().await {
                warn!("Component shutdown error: {}", e);
            }
        }
        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Scheduler shutdown error: {}", e);
        }

        Ok(())
    }
}
