use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

use super::types::RunRecord;
use super::{RecordStore, json_column};

const RUN_COLUMNS: &str = "id, repository_id, status, total_agents, completed_agents, transaction_hash, content_hash, error, metadata, created_at, started_at, completed_at";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        status: row.get(2)?,
        total_agents: row.get(3)?,
        completed_agents: row.get(4)?,
        transaction_hash: row.get(5)?,
        content_hash: row.get(6)?,
        error: row.get(7)?,
        metadata: json_column(row.get(8)?),
        created_at: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

impl RecordStore {
    pub async fn create_run(
        &self,
        repository_id: &str,
        total_agents: i64,
        metadata: Option<&serde_json::Value>,
    ) -> Result<RunRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let metadata = metadata
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO test_runs (id, repository_id, status, total_agents, completed_agents, metadata)
             VALUES (?1, ?2, 'queued', ?3, 0, ?4)",
            params![id, repository_id, total_agents, metadata.to_string()],
        )?;
        let rec = db.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM test_runs WHERE id = ?1"),
            params![id],
            run_from_row,
        )?;
        Ok(rec)
    }

    pub async fn get_run(&self, id: &str) -> Result<Option<RunRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM test_runs WHERE id = ?1"),
                params![id],
                run_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM test_runs ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], run_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Queued runs, oldest first.
    pub async fn list_queued_runs(&self) -> Result<Vec<RunRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM test_runs WHERE status = 'queued' ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([], run_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn get_run_status(&self, id: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let status = db
            .query_row(
                "SELECT status FROM test_runs WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    /// Flip a run from `queued` to `running`, resetting its progress counters.
    /// Returns `false` when the run is no longer queued (another sweep won).
    pub async fn claim_run(&self, id: &str, total_agents: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE test_runs
             SET status = 'running', started_at = CURRENT_TIMESTAMP, total_agents = ?1, completed_agents = 0
             WHERE id = ?2 AND status = 'queued'",
            params![total_agents, id],
        )?;
        Ok(rows > 0)
    }

    /// Raise the progress counter of a running run. The counter never moves
    /// backwards.
    pub async fn advance_run_progress(&self, id: &str, completed_agents: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE test_runs SET completed_agents = MAX(completed_agents, ?1)
             WHERE id = ?2 AND status = 'running'",
            params![completed_agents, id],
        )?;
        Ok(rows > 0)
    }

    /// Move a running run to a terminal status and stamp its completion time.
    pub async fn finish_run(&self, id: &str, status: &str, error: Option<&str>) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE test_runs
             SET status = ?1, error = COALESCE(?2, error), completed_at = CURRENT_TIMESTAMP
             WHERE id = ?3 AND status = 'running'",
            params![status, error, id],
        )?;
        Ok(rows > 0)
    }

    pub async fn cancel_run(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE test_runs SET status = 'cancelled', completed_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND status IN ('queued', 'running')",
            params![id],
        )?;
        Ok(rows > 0)
    }

    /// Store externally computed ledger/content hashes. These are opaque to
    /// the orchestrator.
    pub async fn set_run_hashes(
        &self,
        id: &str,
        transaction_hash: Option<&str>,
        content_hash: Option<&str>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE test_runs
             SET transaction_hash = COALESCE(?1, transaction_hash), content_hash = COALESCE(?2, content_hash)
             WHERE id = ?3",
            params![transaction_hash, content_hash, id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::store::test_store_with_repo;

    #[tokio::test]
    async fn queued_runs_are_listed_oldest_first() {
        let (store, repo) = test_store_with_repo().await;
        let first = store.create_run(&repo.id, 9, None).await.unwrap();
        let second = store.create_run(&repo.id, 9, None).await.unwrap();
        let third = store.create_run(&repo.id, 9, None).await.unwrap();
        assert!(store.claim_run(&second.id, 9).await.unwrap());

        let queued: Vec<String> = store
            .list_queued_runs()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(queued, vec![first.id, third.id]);
    }

    #[tokio::test]
    async fn claim_is_a_compare_and_swap() {
        let (store, repo) = test_store_with_repo().await;
        let run = store.create_run(&repo.id, 9, None).await.unwrap();
        assert!(store.claim_run(&run.id, 9).await.unwrap());
        assert!(!store.claim_run(&run.id, 9).await.unwrap());

        let claimed = store.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(claimed.status, "running");
        assert!(claimed.started_at.is_some());
        assert_eq!(claimed.completed_agents, 0);
    }

    #[tokio::test]
    async fn progress_never_decreases_or_exceeds_total() {
        let (store, repo) = test_store_with_repo().await;
        let run = store.create_run(&repo.id, 9, None).await.unwrap();
        store.claim_run(&run.id, 9).await.unwrap();

        store.advance_run_progress(&run.id, 4).await.unwrap();
        store.advance_run_progress(&run.id, 2).await.unwrap();
        let rec = store.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(rec.completed_agents, 4);

        assert!(store.advance_run_progress(&run.id, 10).await.is_err());
    }

    #[tokio::test]
    async fn finish_only_applies_to_running_runs() {
        let (store, repo) = test_store_with_repo().await;
        let run = store.create_run(&repo.id, 9, None).await.unwrap();
        assert!(!store.finish_run(&run.id, "completed", None).await.unwrap());

        store.claim_run(&run.id, 9).await.unwrap();
        assert!(store.cancel_run(&run.id).await.unwrap());
        assert!(!store.finish_run(&run.id, "completed", None).await.unwrap());
        assert_eq!(
            store.get_run_status(&run.id).await.unwrap().as_deref(),
            Some("cancelled")
        );
    }

    #[tokio::test]
    async fn hashes_are_stored_verbatim() {
        let (store, repo) = test_store_with_repo().await;
        let run = store.create_run(&repo.id, 9, None).await.unwrap();
        store
            .set_run_hashes(&run.id, Some("0xabc"), Some("bafy123"))
            .await
            .unwrap();
        let rec = store.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(rec.transaction_hash.as_deref(), Some("0xabc"));
        assert_eq!(rec.content_hash.as_deref(), Some("bafy123"));
    }
}
