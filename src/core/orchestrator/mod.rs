mod context;
mod driver;
pub mod executor;
mod isolate;
mod sweep;
pub mod types;

pub use context::WorkflowContext;
pub use driver::drive_run;
pub use executor::{SimulatedSteps, StepError, StepExecutor, StepInput, StepOutput, StepRunner};
pub use isolate::{fold_isolated, map_isolated};
pub use sweep::{Orchestrator, TriggerError};
pub use types::{
    RosterMode, RunOutcome, RunState, StepKind, StepOutcome, StepState, SweepReport,
    WORKFLOW_SEQUENCE,
};

pub fn can_transition(from: RunState, to: RunState) -> bool {
    if from == to {
        return true;
    }
    match from {
        RunState::Queued => matches!(to, RunState::Running | RunState::Cancelled),
        RunState::Running => matches!(
            to,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        ),
        RunState::Completed | RunState::Failed | RunState::Cancelled => false,
    }
}

#[cfg(test)]
mod tests;
