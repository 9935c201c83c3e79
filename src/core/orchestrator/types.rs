use serde::Serialize;

/// One slot of the QA workflow. Each kind is served by agents of the matching
/// agent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    RepoClone,
    Fuzz,
    UnitTest,
    IntegrationTest,
    BugAnalysis,
    SecurityScan,
    Aggregate,
    LedgerLog,
    VoiceSummary,
}

/// The fixed step order. Later steps read earlier steps' payloads.
pub const WORKFLOW_SEQUENCE: [StepKind; 9] = [
    StepKind::RepoClone,
    StepKind::Fuzz,
    StepKind::UnitTest,
    StepKind::IntegrationTest,
    StepKind::BugAnalysis,
    StepKind::SecurityScan,
    StepKind::Aggregate,
    StepKind::LedgerLog,
    StepKind::VoiceSummary,
];

impl StepKind {
    /// Canonical agent type serving this step.
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::RepoClone => "repoClonerAgent",
            StepKind::Fuzz => "fuzzAgent",
            StepKind::UnitTest => "unitTestAgent",
            StepKind::IntegrationTest => "integrationAgent",
            StepKind::BugAnalysis => "mistralBugReasoningAgent",
            StepKind::SecurityScan => "securityAgent",
            StepKind::Aggregate => "aggregatorAgent",
            StepKind::LedgerLog => "blockchainLogger",
            StepKind::VoiceSummary => "voiceQAagent",
        }
    }

    /// Key under which the step's payload is stored in the workflow context.
    pub fn step_key(self) -> &'static str {
        match self {
            StepKind::RepoClone => "clone",
            StepKind::Fuzz => "fuzz",
            StepKind::UnitTest => "unit-test",
            StepKind::IntegrationTest => "integration-test",
            StepKind::BugAnalysis => "ai-bug-analysis",
            StepKind::SecurityScan => "security-scan",
            StepKind::Aggregate => "aggregate",
            StepKind::LedgerLog => "ledger-log",
            StepKind::VoiceSummary => "voice-summary",
        }
    }

    /// Resolve an agent type, accepting the legacy snake_case synonyms.
    pub fn from_agent_type(value: &str) -> Option<Self> {
        match value {
            "repoClonerAgent" | "repo_cloner" => Some(StepKind::RepoClone),
            "fuzzAgent" | "fuzz_test" => Some(StepKind::Fuzz),
            "unitTestAgent" | "unit_test" => Some(StepKind::UnitTest),
            "integrationAgent" | "integration_test" => Some(StepKind::IntegrationTest),
            "mistralBugReasoningAgent" | "mistral_reasoning" => Some(StepKind::BugAnalysis),
            "securityAgent" | "security_audit" => Some(StepKind::SecurityScan),
            "aggregatorAgent" | "aggregator" => Some(StepKind::Aggregate),
            "blockchainLogger" => Some(StepKind::LedgerLog),
            "voiceQAagent" | "voice_qa" => Some(StepKind::VoiceSummary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(RunState::Queued),
            "running" => Some(RunState::Running),
            "completed" => Some(RunState::Completed),
            "failed" => Some(RunState::Failed),
            "cancelled" => Some(RunState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepState {
    pub fn as_str(self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Completed => "completed",
            StepState::Failed => "failed",
        }
    }
}

/// Which agents a sweep draws from: registered ones when any exist, all
/// active agents otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterMode {
    Registered,
    Unregistered,
}

/// Normalized result of running one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub success: bool,
    pub duration_ms: u64,
    pub log: String,
    pub data: serde_json::Value,
}

/// Per-run entry of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub repository: String,
    pub status: String,
    pub total_agents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub roster_mode: RosterMode,
    pub roster_size: usize,
    pub results: Vec<RunOutcome>,
}
