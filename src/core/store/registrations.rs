use anyhow::Result;
use rusqlite::params;

use super::RecordStore;
use super::types::RegistrationRecord;

impl RecordStore {
    /// Append one registration attempt. Attempts are never upserted.
    pub async fn add_registration(
        &self,
        agent_id: &str,
        coordination_endpoint: &str,
        status: &str,
        response: Option<&str>,
    ) -> Result<RegistrationRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agent_registrations (id, agent_id, coordination_endpoint, status, response)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, agent_id, coordination_endpoint, status, response],
        )?;
        let rec = db.query_row(
            "SELECT id, agent_id, coordination_endpoint, status, response, created_at
             FROM agent_registrations WHERE id = ?1",
            params![id],
            |row| {
                Ok(RegistrationRecord {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    coordination_endpoint: row.get(2)?,
                    status: row.get(3)?,
                    response: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )?;
        Ok(rec)
    }

    pub async fn list_registrations(&self, agent_id: &str) -> Result<Vec<RegistrationRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, agent_id, coordination_endpoint, status, response, created_at
             FROM agent_registrations WHERE agent_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![agent_id], |row| {
            Ok(RegistrationRecord {
                id: row.get(0)?,
                agent_id: row.get(1)?,
                coordination_endpoint: row.get(2)?,
                status: row.get(3)?,
                response: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
