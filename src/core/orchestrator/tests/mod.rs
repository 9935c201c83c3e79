mod failures;
mod state_machine;

use std::sync::Arc;
use std::time::Duration;

use crate::core::orchestrator::{Orchestrator, SimulatedSteps, StepExecutor, StepRunner};
use crate::core::store::RecordStore;
use crate::core::store::types::{AgentRecord, NewAgent};

pub(super) fn orchestrator_with(store: &RecordStore, runner: Arc<dyn StepRunner>) -> Orchestrator {
    Orchestrator::new(
        store.clone(),
        StepExecutor::new(runner, Duration::from_secs(5)),
    )
}

pub(super) fn simulated(store: &RecordStore) -> Orchestrator {
    orchestrator_with(store, Arc::new(SimulatedSteps::new(false, Some(7))))
}

pub(super) async fn add_agent(store: &RecordStore, agent_type: &str) -> AgentRecord {
    store
        .create_agent(&NewAgent::of_type(&format!("{}-1", agent_type), agent_type))
        .await
        .unwrap()
}
