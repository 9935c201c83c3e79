use anyhow::Result;
use rusqlite::{Row, params};

use super::types::StepResultRecord;
use super::{RecordStore, json_column};

const RESULT_COLUMNS: &str = "id, test_run_id, agent_id, agent_type, status, result_data, logs, execution_time_ms, created_at, started_at, completed_at";

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<StepResultRecord> {
    Ok(StepResultRecord {
        id: row.get(0)?,
        test_run_id: row.get(1)?,
        agent_id: row.get(2)?,
        agent_type: row.get(3)?,
        status: row.get(4)?,
        result_data: json_column(row.get(5)?),
        logs: row.get(6)?,
        execution_time_ms: row.get(7)?,
        created_at: row.get(8)?,
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

/// Terminal write for a step result.
#[derive(Debug, Clone)]
pub struct StepCompletion<'a> {
    pub status: &'a str,
    pub result_data: &'a serde_json::Value,
    pub logs: &'a str,
    pub execution_time_ms: Option<i64>,
}

impl RecordStore {
    /// Insert a step result in `running` state with its start time stamped.
    pub async fn insert_step_result(
        &self,
        run_id: &str,
        agent_id: &str,
        agent_type: &str,
    ) -> Result<StepResultRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO test_results (id, test_run_id, agent_id, agent_type, status, started_at)
             VALUES (?1, ?2, ?3, ?4, 'running', CURRENT_TIMESTAMP)",
            params![id, run_id, agent_id, agent_type],
        )?;
        let rec = db.query_row(
            &format!("SELECT {RESULT_COLUMNS} FROM test_results WHERE id = ?1"),
            params![id],
            result_from_row,
        )?;
        Ok(rec)
    }

    pub async fn complete_step_result(&self, id: &str, done: &StepCompletion<'_>) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE test_results
             SET status = ?1, result_data = ?2, logs = ?3, execution_time_ms = ?4, completed_at = CURRENT_TIMESTAMP
             WHERE id = ?5",
            params![
                done.status,
                done.result_data.to_string(),
                done.logs,
                done.execution_time_ms,
                id
            ],
        )?;
        Ok(rows > 0)
    }

    /// Fallback terminal write when the step result id is unknown: updates any
    /// unfinished result of this agent within the run.
    pub async fn complete_step_result_by_run_agent(
        &self,
        run_id: &str,
        agent_id: &str,
        done: &StepCompletion<'_>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE test_results
             SET status = ?1, result_data = ?2, logs = ?3, execution_time_ms = ?4, completed_at = CURRENT_TIMESTAMP
             WHERE test_run_id = ?5 AND agent_id = ?6 AND status IN ('pending', 'running')",
            params![
                done.status,
                done.result_data.to_string(),
                done.logs,
                done.execution_time_ms,
                run_id,
                agent_id
            ],
        )?;
        Ok(rows > 0)
    }

    /// Insert an already-finished step result in one write.
    pub async fn insert_finished_step_result(
        &self,
        run_id: &str,
        agent_id: &str,
        agent_type: &str,
        done: &StepCompletion<'_>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO test_results
             (id, test_run_id, agent_id, agent_type, status, result_data, logs, execution_time_ms, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            params![
                id,
                run_id,
                agent_id,
                agent_type,
                done.status,
                done.result_data.to_string(),
                done.logs,
                done.execution_time_ms
            ],
        )?;
        Ok(id)
    }

    pub async fn list_step_results(&self, run_id: &str) -> Result<Vec<StepResultRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {RESULT_COLUMNS} FROM test_results WHERE test_run_id = ?1 ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![run_id], result_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::StepCompletion;
    use crate::core::store::test_store_with_repo;
    use crate::core::store::types::NewAgent;

    #[tokio::test]
    async fn step_result_moves_from_running_to_completed() {
        let (store, repo) = test_store_with_repo().await;
        let agent = store
            .create_agent(&NewAgent::of_type("u", "unitTestAgent"))
            .await
            .unwrap();
        let run = store.create_run(&repo.id, 9, None).await.unwrap();
        let rec = store
            .insert_step_result(&run.id, &agent.id, "unitTestAgent")
            .await
            .unwrap();
        assert_eq!(rec.status, "running");
        assert!(rec.started_at.is_some());

        let data = serde_json::json!({ "passed": 10, "failed": 0 });
        let done = StepCompletion {
            status: "completed",
            result_data: &data,
            logs: "ok",
            execution_time_ms: Some(12),
        };
        assert!(store.complete_step_result(&rec.id, &done).await.unwrap());

        let all = store.list_step_results(&run.id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, "completed");
        assert_eq!(all[0].result_data["passed"], 10);
        assert_eq!(all[0].execution_time_ms, Some(12));
        assert!(all[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn fallback_update_targets_unfinished_rows_only() {
        let (store, repo) = test_store_with_repo().await;
        let agent = store
            .create_agent(&NewAgent::of_type("s", "securityAgent"))
            .await
            .unwrap();
        let run = store.create_run(&repo.id, 9, None).await.unwrap();
        let data = serde_json::json!({ "error": "boom" });
        let failed = StepCompletion {
            status: "failed",
            result_data: &data,
            logs: "boom",
            execution_time_ms: None,
        };

        assert!(
            !store
                .complete_step_result_by_run_agent(&run.id, &agent.id, &failed)
                .await
                .unwrap()
        );
        store
            .insert_step_result(&run.id, &agent.id, "securityAgent")
            .await
            .unwrap();
        assert!(
            store
                .complete_step_result_by_run_agent(&run.id, &agent.id, &failed)
                .await
                .unwrap()
        );
        let all = store.list_step_results(&run.id).await.unwrap();
        assert_eq!(all[0].status, "failed");
        assert_eq!(all[0].result_data["error"], "boom");
    }
}
