use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

use super::types::{AgentPatch, AgentRecord, NewAgent};
use super::{RecordStore, json_column};

const AGENT_COLUMNS: &str = "id, name, agent_type, endpoint_url, coral_agent_id, status, capabilities, metadata, created_at, updated_at";

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<AgentRecord> {
    Ok(AgentRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        agent_type: row.get(2)?,
        endpoint_url: row.get(3)?,
        coral_agent_id: row.get(4)?,
        status: row.get(5)?,
        capabilities: json_column(row.get(6)?),
        metadata: json_column(row.get(7)?),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl RecordStore {
    pub async fn create_agent(&self, agent: &NewAgent) -> Result<AgentRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let capabilities = agent
            .capabilities
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let metadata = agent
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agents (id, name, agent_type, endpoint_url, status, capabilities, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                agent.name,
                agent.agent_type,
                agent.endpoint_url,
                agent.status.as_deref().unwrap_or("active"),
                capabilities.to_string(),
                metadata.to_string()
            ],
        )?;
        let rec = db.query_row(
            &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
            params![id],
            agent_from_row,
        )?;
        Ok(rec)
    }

    pub async fn get_agent(&self, id: &str) -> Result<Option<AgentRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                params![id],
                agent_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentRecord>> {
        self.query_agents("1 = 1").await
    }

    /// Active agents, optionally restricted to those already holding an
    /// external coordination identifier.
    pub async fn list_active_agents(&self, registered_only: bool) -> Result<Vec<AgentRecord>> {
        if registered_only {
            self.query_agents("status = 'active' AND coral_agent_id IS NOT NULL")
                .await
        } else {
            self.query_agents("status = 'active'").await
        }
    }

    pub async fn list_unregistered_agents(&self) -> Result<Vec<AgentRecord>> {
        self.query_agents("coral_agent_id IS NULL").await
    }

    async fn query_agents(&self, filter: &str) -> Result<Vec<AgentRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE {filter} ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([], agent_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn update_agent(&self, id: &str, patch: &AgentPatch) -> Result<Option<AgentRecord>> {
        {
            let db = self.db.lock().await;
            let rows = db.execute(
                "UPDATE agents SET
                    name = COALESCE(?1, name),
                    agent_type = COALESCE(?2, agent_type),
                    endpoint_url = COALESCE(?3, endpoint_url),
                    status = COALESCE(?4, status),
                    capabilities = COALESCE(?5, capabilities),
                    metadata = COALESCE(?6, metadata),
                    updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?7",
                params![
                    patch.name,
                    patch.agent_type,
                    patch.endpoint_url,
                    patch.status,
                    patch.capabilities.as_ref().map(|v| v.to_string()),
                    patch.metadata.as_ref().map(|v| v.to_string()),
                    id
                ],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_agent(id).await
    }

    /// Record the external identifier and flip the agent to `active`.
    pub async fn mark_agent_registered(&self, id: &str, coral_agent_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE agents SET coral_agent_id = ?1, status = 'active', updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2",
            params![coral_agent_id, id],
        )?;
        Ok(rows > 0)
    }

    pub async fn delete_agent(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::store::RecordStore;
    use crate::core::store::types::{AgentPatch, NewAgent};

    #[tokio::test]
    async fn active_roster_filters_by_status_and_registration() {
        let store = RecordStore::open_in_memory().unwrap();
        let a = store
            .create_agent(&NewAgent::of_type("cloner", "repoClonerAgent"))
            .await
            .unwrap();
        let b = store
            .create_agent(&NewAgent::of_type("fuzzer", "fuzzAgent"))
            .await
            .unwrap();
        let mut idle = NewAgent::of_type("idle", "securityAgent");
        idle.status = Some("maintenance".to_string());
        store.create_agent(&idle).await.unwrap();

        assert!(store.list_active_agents(true).await.unwrap().is_empty());
        assert_eq!(store.list_active_agents(false).await.unwrap().len(), 2);

        assert!(store.mark_agent_registered(&a.id, "ext-1").await.unwrap());
        let registered = store.list_active_agents(true).await.unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].id, a.id);

        let unregistered = store.list_unregistered_agents().await.unwrap();
        assert_eq!(unregistered.len(), 2);
        assert!(unregistered.iter().any(|x| x.id == b.id));
    }

    #[tokio::test]
    async fn update_agent_patches_only_given_fields() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut new = NewAgent::of_type("scanner", "securityAgent");
        new.endpoint_url = Some("http://scanner.local".to_string());
        let agent = store.create_agent(&new).await.unwrap();

        let patch = AgentPatch {
            status: Some("inactive".to_string()),
            metadata: Some(serde_json::json!({ "team": "qa" })),
            ..Default::default()
        };
        let updated = store.update_agent(&agent.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.status, "inactive");
        assert_eq!(updated.name, "scanner");
        assert_eq!(updated.endpoint_url.as_deref(), Some("http://scanner.local"));
        assert_eq!(updated.metadata["team"], "qa");

        assert!(store.update_agent("missing", &patch).await.unwrap().is_none());
    }
}
