//! Sweep and single-run dispatch over queued runs.

use std::fmt;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use super::{
    RosterMode, RunOutcome, RunState, StepExecutor, SweepReport, WORKFLOW_SEQUENCE, drive_run,
    map_isolated,
};
use crate::core::store::RecordStore;
use crate::core::store::types::{AgentRecord, RunRecord};

pub const SKIPPED: &str = "skipped";

#[derive(Debug)]
pub enum TriggerError {
    NotFound(String),
    Store(anyhow::Error),
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerError::NotFound(id) => write!(f, "test run {} not found", id),
            TriggerError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TriggerError {}

#[derive(Clone)]
pub struct Orchestrator {
    store: RecordStore,
    executor: StepExecutor,
}

impl Orchestrator {
    pub fn new(store: RecordStore, executor: StepExecutor) -> Self {
        Self { store, executor }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Registered active agents when any exist, otherwise every active agent.
    pub async fn resolve_roster(&self) -> Result<(RosterMode, Vec<AgentRecord>)> {
        let registered = self.store.list_active_agents(true).await?;
        if !registered.is_empty() {
            return Ok((RosterMode::Registered, registered));
        }
        let all = self.store.list_active_agents(false).await?;
        Ok((RosterMode::Unregistered, all))
    }

    /// Process every queued run, oldest first. Only discovery failures are
    /// returned as `Err`; anything that goes wrong with a single run is
    /// reported in that run's outcome.
    pub async fn process_queued_runs(&self) -> Result<SweepReport> {
        let queued = self.store.list_queued_runs().await?;
        let (roster_mode, roster) = self.resolve_roster().await?;
        info!(
            "Sweep: {} queued runs, {} agents ({:?})",
            queued.len(),
            roster.len(),
            roster_mode
        );

        let results = self.process_runs(&queued, &roster).await;
        Ok(SweepReport {
            roster_mode,
            roster_size: roster.len(),
            results,
        })
    }

    /// Process one run by id. A run that is no longer queued is reported as
    /// skipped with its current status.
    pub async fn trigger(&self, run_id: &str) -> Result<SweepReport, TriggerError> {
        let run = self
            .store
            .get_run(run_id)
            .await
            .map_err(TriggerError::Store)?
            .ok_or_else(|| TriggerError::NotFound(run_id.to_string()))?;
        let (roster_mode, roster) = self.resolve_roster().await.map_err(TriggerError::Store)?;

        let results = if run.status == RunState::Queued.as_str() {
            self.process_runs(std::slice::from_ref(&run), &roster).await
        } else {
            info!("Trigger for run {} ignored: status is {}", run.id, run.status);
            let error = format!("run is {}", run.status);
            vec![self.skipped(&run, error).await]
        };

        Ok(SweepReport {
            roster_mode,
            roster_size: roster.len(),
            results,
        })
    }

    async fn process_runs(&self, runs: &[RunRecord], roster: &[AgentRecord]) -> Vec<RunOutcome> {
        let attempts = map_isolated(runs, |run| self.run_one(run, roster)).await;
        let mut out = Vec::with_capacity(runs.len());
        for (run, attempt) in runs.iter().zip(attempts) {
            let outcome = match attempt {
                Ok(outcome) => outcome,
                Err(e) => self.fail_run(run, e).await,
            };
            out.push(outcome);
        }
        out
    }

    async fn run_one(&self, run: &RunRecord, roster: &[AgentRecord]) -> Result<RunOutcome> {
        let total = WORKFLOW_SEQUENCE.len() as i64;
        match self.store.claim_run(&run.id, total).await {
            Ok(true) => {}
            Ok(false) => {
                return Ok(self.skipped(run, "run was claimed by another sweep".to_string()).await);
            }
            Err(e) => {
                warn!("Could not claim run {}: {}", run.id, e);
                return Ok(self.skipped(run, e.to_string()).await);
            }
        }

        let repository = self
            .store
            .get_repository(&run.repository_id)
            .await?
            .ok_or_else(|| anyhow!("repository {} not found", run.repository_id))?;
        let repository_name = repository.name.clone();
        info!("Run {} started for {}", run.id, repository_name);

        let state = drive_run(&self.store, &self.executor, run, repository, roster).await?;
        Ok(RunOutcome {
            run_id: run.id.clone(),
            repository: repository_name,
            status: state.as_str().to_string(),
            total_agents: total,
            error: None,
        })
    }

    async fn fail_run(&self, run: &RunRecord, err: anyhow::Error) -> RunOutcome {
        let message = err.to_string();
        warn!("Run {} failed: {}", run.id, message);
        if let Err(e) = self
            .store
            .finish_run(&run.id, RunState::Failed.as_str(), Some(&message))
            .await
        {
            warn!("Could not mark run {} failed: {}", run.id, e);
        }
        RunOutcome {
            run_id: run.id.clone(),
            repository: self.repository_label(run).await,
            status: RunState::Failed.as_str().to_string(),
            total_agents: WORKFLOW_SEQUENCE.len() as i64,
            error: Some(message),
        }
    }

    async fn skipped(&self, run: &RunRecord, error: String) -> RunOutcome {
        RunOutcome {
            run_id: run.id.clone(),
            repository: self.repository_label(run).await,
            status: SKIPPED.to_string(),
            total_agents: run.total_agents,
            error: Some(error),
        }
    }

    async fn repository_label(&self, run: &RunRecord) -> String {
        match self.store.get_repository(&run.repository_id).await {
            Ok(Some(repo)) => repo.name,
            _ => run.repository_id.clone(),
        }
    }
}
