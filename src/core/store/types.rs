use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub agent_type: String,
    pub endpoint_url: Option<String>,
    /// Identifier assigned by the external coordination service. `None` until
    /// the agent has been registered.
    pub coral_agent_id: Option<String>,
    pub status: String,
    pub capabilities: Value,
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub name: String,
    #[serde(alias = "type")]
    pub agent_type: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[cfg(test)]
impl NewAgent {
    pub fn of_type(name: &str, agent_type: &str) -> Self {
        Self {
            name: name.to_string(),
            agent_type: agent_type.to_string(),
            endpoint_url: None,
            status: None,
            capabilities: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentPatch {
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub agent_type: Option<String>,
    pub endpoint_url: Option<String>,
    pub status: Option<String>,
    pub capabilities: Option<Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Maintenance,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Inactive => "inactive",
            AgentStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "active" => Some(AgentStatus::Active),
            "inactive" => Some(AgentStatus::Inactive),
            "maintenance" => Some(AgentStatus::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRecord {
    pub id: String,
    pub name: String,
    pub github_url: String,
    pub clone_url: Option<String>,
    pub branch: String,
    pub owner_id: Option<String>,
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
}

impl RepositoryRecord {
    /// URL to fetch sources from: the explicit clone URL when present,
    /// otherwise the browse URL with a `.git` suffix.
    pub fn effective_clone_url(&self) -> String {
        match &self.clone_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => {
                let base = self.github_url.trim_end_matches('/');
                if base.ends_with(".git") {
                    base.to_string()
                } else {
                    format!("{}.git", base)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRepository {
    pub name: String,
    pub github_url: String,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub repository_id: String,
    pub status: String,
    pub total_agents: i64,
    pub completed_agents: i64,
    pub transaction_hash: Option<String>,
    pub content_hash: Option<String>,
    pub error: Option<String>,
    pub metadata: Value,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResultRecord {
    pub id: String,
    pub test_run_id: String,
    pub agent_id: String,
    pub agent_type: String,
    pub status: String,
    pub result_data: Value,
    pub logs: String,
    pub execution_time_ms: Option<i64>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRecord {
    pub id: String,
    pub agent_id: String,
    pub coordination_endpoint: String,
    pub status: String,
    pub response: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(github_url: &str, clone_url: Option<&str>) -> RepositoryRecord {
        RepositoryRecord {
            id: "r1".to_string(),
            name: "demo".to_string(),
            github_url: github_url.to_string(),
            clone_url: clone_url.map(str::to_string),
            branch: "main".to_string(),
            owner_id: None,
            metadata: serde_json::json!({}),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn clone_url_prefers_explicit_value() {
        let r = repo("https://github.com/acme/demo", Some("git@github.com:acme/demo.git"));
        assert_eq!(r.effective_clone_url(), "git@github.com:acme/demo.git");
    }

    #[test]
    fn clone_url_derives_from_browse_url() {
        assert_eq!(
            repo("https://github.com/acme/demo/", None).effective_clone_url(),
            "https://github.com/acme/demo.git"
        );
        assert_eq!(
            repo("https://github.com/acme/demo.git", Some("  ")).effective_clone_url(),
            "https://github.com/acme/demo.git"
        );
    }

    #[test]
    fn new_agent_accepts_type_alias() {
        let parsed: NewAgent =
            serde_json::from_str(r#"{"name":"f","type":"fuzzAgent"}"#).expect("parse");
        assert_eq!(parsed.agent_type, "fuzzAgent");
        assert!(parsed.endpoint_url.is_none());
    }

    #[test]
    fn agent_status_round_trips_known_values() {
        for s in ["active", "inactive", "maintenance"] {
            assert_eq!(AgentStatus::from_status(s).map(AgentStatus::as_str), Some(s));
        }
        assert!(AgentStatus::from_status("retired").is_none());
    }
}
