use std::sync::Arc;

use async_trait::async_trait;

use super::{add_agent, orchestrator_with, simulated};
use crate::core::orchestrator::{
    SimulatedSteps, StepInput, StepKind, StepOutput, StepRunner, WORKFLOW_SEQUENCE,
};
use crate::core::store::RecordStore;
use crate::core::store::test_store_with_repo;

#[tokio::test]
async fn missing_repository_fails_the_run_and_sweep_moves_on() {
    let (store, repo) = test_store_with_repo().await;
    add_agent(&store, "repoClonerAgent").await;
    let orphan = store.create_run(&repo.id, 9, None).await.unwrap();
    let healthy = store.create_run(&repo.id, 9, None).await.unwrap();
    store
        .execute_unchecked(&format!(
            "UPDATE test_runs SET repository_id = 'gone' WHERE id = '{}'",
            orphan.id
        ))
        .await
        .unwrap();

    let report = simulated(&store).process_queued_runs().await.unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].run_id, orphan.id);
    assert_eq!(report.results[0].status, "failed");
    assert_eq!(report.results[0].repository, "gone");
    assert!(
        report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("repository gone not found")
    );
    assert_eq!(report.results[1].run_id, healthy.id);
    assert_eq!(report.results[1].status, "completed");

    let orphan = store.get_run(&orphan.id).await.unwrap().unwrap();
    assert_eq!(orphan.status, "failed");
    assert!(orphan.completed_at.is_some());
    assert!(orphan.error.as_deref().unwrap().contains("not found"));
    assert!(store.list_step_results(&orphan.id).await.unwrap().is_empty());

    let healthy = store.get_run(&healthy.id).await.unwrap().unwrap();
    assert_eq!(healthy.status, "completed");
    assert_eq!(healthy.completed_agents, 1);
}

#[tokio::test]
async fn rejected_step_start_is_recorded_as_failed_and_run_continues() {
    let (store, repo) = test_store_with_repo().await;
    for step in WORKFLOW_SEQUENCE {
        add_agent(&store, step.as_str()).await;
    }
    store
        .execute_unchecked(
            "CREATE TRIGGER reject_fuzz_start BEFORE INSERT ON test_results
             WHEN NEW.status = 'running' AND NEW.agent_type = 'fuzzAgent'
             BEGIN SELECT RAISE(ABORT, 'start rejected'); END;",
        )
        .await
        .unwrap();
    let run = store.create_run(&repo.id, 9, None).await.unwrap();

    simulated(&store).process_queued_runs().await.unwrap();

    let results = store.list_step_results(&run.id).await.unwrap();
    assert_eq!(results.len(), 9);
    let fuzz = results.iter().find(|r| r.agent_type == "fuzzAgent").unwrap();
    assert_eq!(fuzz.status, "failed");
    assert!(fuzz.logs.contains("could not record step start"));
    assert!(fuzz.result_data["error"].as_str().unwrap().contains("start rejected"));
    assert!(
        results
            .iter()
            .filter(|r| r.agent_type != "fuzzAgent")
            .all(|r| r.status == "completed")
    );

    let aggregate = results
        .iter()
        .find(|r| r.agent_type == "aggregatorAgent")
        .unwrap();
    assert_eq!(aggregate.result_data["fuzz_crashes"], 0);

    let run = store.get_run(&run.id).await.unwrap().unwrap();
    assert_eq!(run.status, "completed");
    assert_eq!(run.completed_agents, 9);
}

/// Removes the running result row of its own step before returning.
struct DropOwnResult {
    store: RecordStore,
}

#[async_trait]
impl StepRunner for DropOwnResult {
    async fn run(&self, input: &StepInput) -> anyhow::Result<StepOutput> {
        if input.step == StepKind::UnitTest {
            self.store
                .execute_unchecked(&format!(
                    "DELETE FROM test_results WHERE test_run_id = '{}' AND agent_id = '{}'",
                    input.context.run_id, input.agent.id
                ))
                .await?;
        }
        SimulatedSteps::new(false, Some(3)).run(input).await
    }
}

#[tokio::test]
async fn vanished_result_row_is_reinserted_as_finished() {
    let (store, repo) = test_store_with_repo().await;
    add_agent(&store, "unitTestAgent").await;
    add_agent(&store, "aggregatorAgent").await;
    let run = store.create_run(&repo.id, 9, None).await.unwrap();
    let orch = orchestrator_with(
        &store,
        Arc::new(DropOwnResult {
            store: store.clone(),
        }),
    );

    orch.process_queued_runs().await.unwrap();

    let results = store.list_step_results(&run.id).await.unwrap();
    let units: Vec<_> = results
        .iter()
        .filter(|r| r.agent_type == "unitTestAgent")
        .collect();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].status, "completed");
    assert!(units[0].completed_at.is_some());
    assert!(units[0].result_data["total"].as_u64().unwrap() > 0);
    assert_eq!(store.get_run(&run.id).await.unwrap().unwrap().status, "completed");
}

/// Deletes the agent that is running the fuzz step.
struct DeleteOwnAgent {
    store: RecordStore,
}

#[async_trait]
impl StepRunner for DeleteOwnAgent {
    async fn run(&self, input: &StepInput) -> anyhow::Result<StepOutput> {
        if input.step == StepKind::Fuzz {
            self.store.delete_agent(&input.agent.id).await?;
        }
        SimulatedSteps::new(false, Some(4)).run(input).await
    }
}

#[tokio::test]
async fn agent_deleted_mid_step_does_not_stop_the_run() {
    let (store, repo) = test_store_with_repo().await;
    for step in WORKFLOW_SEQUENCE {
        add_agent(&store, step.as_str()).await;
    }
    let run = store.create_run(&repo.id, 9, None).await.unwrap();
    let orch = orchestrator_with(
        &store,
        Arc::new(DeleteOwnAgent {
            store: store.clone(),
        }),
    );

    let report = orch.process_queued_runs().await.unwrap();
    assert_eq!(report.results[0].status, "completed");

    let results = store.list_step_results(&run.id).await.unwrap();
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|r| r.agent_type != "fuzzAgent"));
    assert!(results.iter().all(|r| r.status == "completed"));

    let run = store.get_run(&run.id).await.unwrap().unwrap();
    assert_eq!(run.status, "completed");
    // The slot was attempted even though its record went with the agent.
    assert_eq!(run.completed_agents, 9);
}
