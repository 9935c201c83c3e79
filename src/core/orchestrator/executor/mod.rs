//! Step execution: runs one step implementation for one agent and normalizes
//! whatever happens into a [`StepOutcome`].
//!
//! Each step runs in its own task under a deadline. A step that errors,
//! panics or overruns its deadline produces `success: false` with
//! `data.error` set; nothing propagates to the caller.

mod report;
mod simulated;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::context::WorkflowContext;
use super::{StepKind, StepOutcome};
use crate::core::store::types::AgentRecord;

pub use report::{aggregate_report, ledger_entry, voice_summary};
pub use simulated::SimulatedSteps;

/// Everything a step implementation may look at.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub step: StepKind,
    pub agent: AgentRecord,
    pub context: WorkflowContext,
}

#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub data: Value,
    pub log: Vec<String>,
}

impl StepOutput {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            log: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.log.push(line.into());
        self
    }
}

/// Implementation behind the steps. The default is [`SimulatedSteps`];
/// deployments can swap in runners that call real tools.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, input: &StepInput) -> anyhow::Result<StepOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    TimedOut { step: StepKind, timeout: Duration },
    Panicked { step: StepKind },
    Aborted { step: StepKind },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::TimedOut { step, timeout } => {
                if timeout.subsec_millis() == 0 {
                    write!(f, "step '{}' timed out after {}s", step.step_key(), timeout.as_secs())
                } else {
                    write!(f, "step '{}' timed out after {}ms", step.step_key(), timeout.as_millis())
                }
            }
            StepError::Panicked { step } => {
                write!(f, "step '{}' panicked", step.step_key())
            }
            StepError::Aborted { step } => {
                write!(f, "step '{}' was aborted", step.step_key())
            }
        }
    }
}

impl std::error::Error for StepError {}

#[derive(Clone)]
pub struct StepExecutor {
    runner: Arc<dyn StepRunner>,
    timeout: Duration,
}

impl StepExecutor {
    pub fn new(runner: Arc<dyn StepRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    pub async fn execute(
        &self,
        step: StepKind,
        agent: &AgentRecord,
        context: &WorkflowContext,
    ) -> StepOutcome {
        let started = Instant::now();
        let mut log = vec![format!(
            "{} ({}) starting {}",
            agent.name,
            agent.agent_type,
            step.step_key()
        )];

        let input = StepInput {
            step,
            agent: agent.clone(),
            context: context.clone(),
        };
        let runner = self.runner.clone();
        let mut handle = tokio::spawn(async move { runner.run(&input).await });

        let result = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => Err(StepError::Panicked { step }.into()),
            Ok(Err(_)) => Err(StepError::Aborted { step }.into()),
            Err(_) => {
                handle.abort();
                Err(StepError::TimedOut {
                    step,
                    timeout: self.timeout,
                }
                .into())
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                log.extend(output.log);
                log.push(format!("{} completed in {}ms", step.step_key(), duration_ms));
                info!(
                    "Step {} by {} completed in {}ms",
                    step.step_key(),
                    agent.name,
                    duration_ms
                );
                StepOutcome {
                    success: true,
                    duration_ms,
                    log: log.join("\n"),
                    data: output.data,
                }
            }
            Err(e) => {
                let message = e.to_string();
                log.push(format!("{} failed after {}ms: {}", step.step_key(), duration_ms, message));
                warn!("Step {} by {} failed: {}", step.step_key(), agent.name, message);
                StepOutcome {
                    success: false,
                    duration_ms,
                    log: log.join("\n"),
                    data: serde_json::json!({ "error": message }),
                }
            }
        }
    }
}
