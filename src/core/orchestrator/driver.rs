//! Per-run driver: walks the fixed step sequence once for a claimed run.
//!
//! The workflow context is the fold state. A failing step leaves a failed
//! step result behind and the loop moves on; only the final run transition
//! can fail the driver as a whole.

use anyhow::{Result, anyhow};
use serde_json::json;
use tracing::{info, warn};

use super::{
    RunState, StepExecutor, StepKind, StepOutcome, StepState, WORKFLOW_SEQUENCE, WorkflowContext,
    can_transition, fold_isolated,
};
use crate::core::store::{RecordStore, StepCompletion};
use crate::core::store::types::{AgentRecord, RepositoryRecord, RunRecord};

struct Progress {
    context: WorkflowContext,
    attempted: i64,
    /// Set when the run left `running` underneath the driver.
    halted: Option<RunState>,
}

/// Drive a run that is already `running`. Returns the state the run was left
/// in: `Completed`, or whatever terminal state it was moved to mid-way
/// (normally `Cancelled`).
pub async fn drive_run(
    store: &RecordStore,
    executor: &StepExecutor,
    run: &RunRecord,
    repository: RepositoryRecord,
    roster: &[AgentRecord],
) -> Result<RunState> {
    let run_id = run.id.as_str();
    let init = Progress {
        context: WorkflowContext::new(run_id, repository),
        attempted: 0,
        halted: None,
    };

    let (progress, step_results) = fold_isolated(WORKFLOW_SEQUENCE, init, |p, step| {
        drive_step(store, executor, run_id, roster, p, step)
    })
    .await;

    for (step, res) in WORKFLOW_SEQUENCE.iter().zip(&step_results) {
        if let Err(e) = res {
            warn!("Run {} step {} left an incomplete record: {}", run_id, step.step_key(), e);
        }
    }

    if let Some(state) = progress.halted {
        info!(
            "Run {} stopped as {} after {} steps",
            run_id,
            state.as_str(),
            progress.attempted
        );
        return Ok(state);
    }

    if store
        .finish_run(run_id, RunState::Completed.as_str(), None)
        .await?
    {
        info!(
            "Run {} completed ({} of {} steps attempted)",
            run_id,
            progress.attempted,
            WORKFLOW_SEQUENCE.len()
        );
        return Ok(RunState::Completed);
    }

    // Someone else moved the run out of `running` after the last step.
    let status = store
        .get_run_status(run_id)
        .await?
        .ok_or_else(|| anyhow!("run {} disappeared", run_id))?;
    RunState::from_status(&status).ok_or_else(|| anyhow!("run {} has unknown status {}", run_id, status))
}

async fn drive_step(
    store: &RecordStore,
    executor: &StepExecutor,
    run_id: &str,
    roster: &[AgentRecord],
    mut p: Progress,
    step: StepKind,
) -> (Progress, Result<()>) {
    if p.halted.is_some() {
        return (p, Ok(()));
    }
    match store.get_run_status(run_id).await {
        Ok(Some(status)) => {
            if let Some(state) = RunState::from_status(&status)
                && !can_transition(state, RunState::Running)
            {
                p.halted = Some(state);
                return (p, Ok(()));
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Could not re-read status of run {}: {}", run_id, e),
    }

    let Some(agent) = roster
        .iter()
        .find(|a| StepKind::from_agent_type(&a.agent_type) == Some(step))
    else {
        info!("Run {}: no agent for step {}, skipping", run_id, step.step_key());
        return (p, Ok(()));
    };

    let (result_id, outcome) = match store
        .insert_step_result(run_id, &agent.id, &agent.agent_type)
        .await
    {
        Ok(rec) => (Some(rec.id), executor.execute(step, agent, &p.context).await),
        Err(e) => {
            warn!("Run {}: could not record start of {}: {}", run_id, step.step_key(), e);
            let outcome = StepOutcome {
                success: false,
                duration_ms: 0,
                log: format!("could not record step start: {}", e),
                data: json!({ "error": e.to_string() }),
            };
            (None, outcome)
        }
    };

    let status = if outcome.success {
        StepState::Completed
    } else {
        StepState::Failed
    };
    let done = StepCompletion {
        status: status.as_str(),
        result_data: &outcome.data,
        logs: &outcome.log,
        execution_time_ms: Some(outcome.duration_ms as i64),
    };
    let persisted = persist_outcome(store, run_id, agent, result_id.as_deref(), &done).await;

    if step == StepKind::LedgerLog && outcome.success {
        let tx = outcome.data.get("transaction_hash").and_then(|v| v.as_str());
        let content = outcome.data.get("content_hash").and_then(|v| v.as_str());
        if let Err(e) = store.set_run_hashes(run_id, tx, content).await {
            warn!("Run {}: could not store ledger hashes: {}", run_id, e);
        }
    }

    p.context = p.context.with_result(step, outcome.data);
    p.attempted += 1;
    let advanced = store
        .advance_run_progress(run_id, p.attempted)
        .await
        .map(|_| ());

    (p, persisted.and(advanced))
}

/// Terminal write for one step, falling back from update-by-id to
/// update-by-(run, agent) to a fresh finished insert.
async fn persist_outcome(
    store: &RecordStore,
    run_id: &str,
    agent: &AgentRecord,
    result_id: Option<&str>,
    done: &StepCompletion<'_>,
) -> Result<()> {
    if let Some(id) = result_id {
        match store.complete_step_result(id, done).await {
            Ok(true) => return Ok(()),
            Ok(false) => warn!("Step result {} vanished before completion", id),
            Err(e) => warn!("Could not complete step result {}: {}", id, e),
        }
    }
    if store
        .complete_step_result_by_run_agent(run_id, &agent.id, done)
        .await?
    {
        return Ok(());
    }
    store
        .insert_finished_step_result(run_id, &agent.id, &agent.agent_type, done)
        .await?;
    Ok(())
}
