//! Registers agents that have no external identifier yet with the
//! coordination service.

use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::config::CoordinationConfig;
use crate::core::orchestrator::map_isolated;
use crate::core::store::RecordStore;
use crate::core::store::types::AgentRecord;

const ID_KEYS: [&str; 3] = ["coral_agent_id", "agent_id", "id"];

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub agent_id: String,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coral_agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct RegistrationManager {
    store: RecordStore,
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl RegistrationManager {
    pub fn new(store: RecordStore, config: &CoordinationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            store,
            client,
            endpoint: config.url.clone().filter(|u| !u.trim().is_empty()),
            api_key: config.api_key.clone(),
        })
    }

    /// Attempt registration for every agent without an external id. Agents are
    /// handled one by one; a failure is reported in that agent's outcome.
    pub async fn register_pending_agents(&self) -> Result<Vec<RegistrationOutcome>> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("coordination endpoint is not configured"))?;
        let pending = self.store.list_unregistered_agents().await?;
        info!("Registering {} agents with {}", pending.len(), endpoint);

        let attempts = map_isolated(&pending, |agent| self.register_one(endpoint, agent)).await;

        let mut outcomes = Vec::with_capacity(pending.len());
        for (agent, attempt) in pending.iter().zip(attempts) {
            let outcome = match attempt {
                Ok(coral_agent_id) => RegistrationOutcome {
                    agent_id: agent.id.clone(),
                    name: agent.name.clone(),
                    status: "registered".to_string(),
                    coral_agent_id: Some(coral_agent_id),
                    error: None,
                },
                Err(e) => {
                    let message = e.to_string();
                    warn!("Registration of agent {} failed: {}", agent.name, message);
                    if let Err(e) = self
                        .store
                        .add_registration(&agent.id, endpoint, "failed", Some(&message))
                        .await
                    {
                        warn!("Could not record failed registration for {}: {}", agent.id, e);
                    }
                    RegistrationOutcome {
                        agent_id: agent.id.clone(),
                        name: agent.name.clone(),
                        status: "failed".to_string(),
                        coral_agent_id: None,
                        error: Some(message),
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn register_one(&self, endpoint: &str, agent: &AgentRecord) -> Result<String> {
        let payload = serde_json::json!({
            "agent_id": agent.id,
            "name": agent.name,
            "type": agent.agent_type,
            "endpoint_url": agent.endpoint_url,
            "capabilities": agent.capabilities,
            "metadata": agent.metadata,
        });
        let mut req = self.client.post(endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("coordination service returned {}: {}", status, body);
        }

        let coral_agent_id =
            extract_external_id(&body).unwrap_or_else(|| format!("local-{}", agent.id));
        if !self
            .store
            .mark_agent_registered(&agent.id, &coral_agent_id)
            .await?
        {
            bail!("agent {} was deleted during registration", agent.id);
        }
        if let Err(e) = self
            .store
            .add_registration(&agent.id, endpoint, "registered", Some(&body))
            .await
        {
            warn!("Could not record registration for {}: {}", agent.id, e);
        }
        info!("Agent {} registered as {}", agent.name, coral_agent_id);
        Ok(coral_agent_id)
    }
}

fn extract_external_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ID_KEYS.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}
