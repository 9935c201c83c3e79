//! SQLite-backed record store for agents, repositories, test runs, step
//! results and registration attempts.
//!
//! All access goes through a single connection behind an async mutex. Foreign
//! keys are enforced so that deleting a run or an agent cascades to the rows
//! that reference it.

mod agents;
mod registrations;
mod repositories;
mod results;
mod runs;
pub mod types;

pub use results::StepCompletion;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const AGENT_TYPE_CHECK: &str = "'repoClonerAgent','fuzzAgent','unitTestAgent','integrationAgent',\
'mistralBugReasoningAgent','securityAgent','aggregatorAgent','blockchainLogger','voiceQAagent',\
'repo_cloner','unit_test','integration_test','security_audit','fuzz_test','voice_qa',\
'mistral_reasoning','aggregator'";

#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Mutex<Connection>>,
}

impl RecordStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = Connection::open(path)?;
        init_schema(&db)?;
        info!("Record store opened at {}", path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        init_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Deletes every step result and then every run. Agents and repositories
    /// are left untouched. Returns `(deleted_results, deleted_runs)`.
    pub async fn clear_run_data(&self) -> Result<(usize, usize)> {
        let db = self.db.lock().await;
        let results = db.execute("DELETE FROM test_results", [])?;
        let runs = db.execute("DELETE FROM test_runs", [])?;
        Ok((results, runs))
    }

    /// Run raw SQL with foreign keys switched off, to put rows into states the
    /// public API never produces.
    #[cfg(test)]
    pub async fn execute_unchecked(&self, sql: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let res = db.execute_batch(sql);
        db.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(res?)
    }
}

fn init_schema(db: &Connection) -> Result<()> {
    db.execute_batch("PRAGMA foreign_keys = ON;")?;

    db.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                agent_type TEXT NOT NULL CHECK (agent_type IN ({types})),
                endpoint_url TEXT,
                coral_agent_id TEXT,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active','inactive','maintenance')),
                capabilities TEXT NOT NULL DEFAULT '{{}}',
                metadata TEXT NOT NULL DEFAULT '{{}}',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            types = AGENT_TYPE_CHECK
        ),
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS repositories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            github_url TEXT NOT NULL,
            clone_url TEXT,
            branch TEXT NOT NULL DEFAULT 'main',
            owner_id TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS test_runs (
            id TEXT PRIMARY KEY,
            repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'queued'
                CHECK (status IN ('queued','running','completed','failed','cancelled')),
            total_agents INTEGER NOT NULL DEFAULT 0,
            completed_agents INTEGER NOT NULL DEFAULT 0,
            transaction_hash TEXT,
            content_hash TEXT,
            error TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            started_at DATETIME,
            completed_at DATETIME,
            CHECK (completed_agents >= 0 AND completed_agents <= total_agents)
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS test_results (
            id TEXT PRIMARY KEY,
            test_run_id TEXT NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
            agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
            agent_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','running','completed','failed')),
            result_data TEXT NOT NULL DEFAULT '{}',
            logs TEXT NOT NULL DEFAULT '',
            execution_time_ms INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            started_at DATETIME,
            completed_at DATETIME
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS agent_registrations (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
            coordination_endpoint TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending','registered','failed')),
            response TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_test_runs_status_created ON test_runs(status, created_at)",
        [],
    )?;
    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_test_results_run ON test_results(test_run_id)",
        [],
    )?;
    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_agent_registrations_agent ON agent_registrations(agent_id)",
        [],
    )?;

    Ok(())
}

/// Parse a JSON column, falling back to an empty object for malformed text.
pub(crate) fn json_column(raw: String) -> serde_json::Value {
    serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({}))
}

/// Create an in-memory store seeded with one repository, for tests.
#[cfg(test)]
pub async fn test_store_with_repo() -> (RecordStore, types::RepositoryRecord) {
    let store = RecordStore::open_in_memory().expect("open in-memory store");
    let repo = store
        .create_repository(&types::NewRepository {
            name: "demo".to_string(),
            github_url: "https://github.com/acme/demo".to_string(),
            clone_url: None,
            branch: None,
            owner_id: None,
            metadata: None,
        })
        .await
        .expect("create repo");
    (store, repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::NewAgent;

    #[tokio::test]
    async fn clear_run_data_keeps_agents_and_repositories() {
        let (store, repo) = test_store_with_repo().await;
        let repo_id = repo.id;
        let agent = store
            .create_agent(&NewAgent::of_type("cloner", "repoClonerAgent"))
            .await
            .unwrap();
        let run = store.create_run(&repo_id, 9, None).await.unwrap();
        store
            .insert_step_result(&run.id, &agent.id, "repoClonerAgent")
            .await
            .unwrap();

        let (results, runs) = store.clear_run_data().await.unwrap();
        assert_eq!(results, 1);
        assert_eq!(runs, 1);
        assert!(store.list_runs(10).await.unwrap().is_empty());
        assert_eq!(store.list_agents().await.unwrap().len(), 1);
        assert_eq!(store.list_repositories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_agent_type_is_rejected_by_schema() {
        let store = RecordStore::open_in_memory().unwrap();
        let res = store
            .create_agent(&NewAgent::of_type("odd", "coffeeAgent"))
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn legacy_agent_type_is_accepted() {
        let store = RecordStore::open_in_memory().unwrap();
        let agent = store
            .create_agent(&NewAgent::of_type("legacy", "unit_test"))
            .await
            .unwrap();
        assert_eq!(agent.agent_type, "unit_test");
    }

    #[tokio::test]
    async fn deleting_agent_cascades_to_results_and_registrations() {
        let (store, repo) = test_store_with_repo().await;
        let repo_id = repo.id;
        let agent = store
            .create_agent(&NewAgent::of_type("fuzzer", "fuzzAgent"))
            .await
            .unwrap();
        let run = store.create_run(&repo_id, 9, None).await.unwrap();
        store
            .insert_step_result(&run.id, &agent.id, "fuzzAgent")
            .await
            .unwrap();
        store
            .add_registration(&agent.id, "http://coord.local", "failed", Some("boom"))
            .await
            .unwrap();

        assert!(store.delete_agent(&agent.id).await.unwrap());
        assert!(store.list_step_results(&run.id).await.unwrap().is_empty());
        assert!(
            store
                .list_registrations(&agent.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn on_disk_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("qaflow.db");
        {
            let store = RecordStore::open(&path).await.unwrap();
            store
                .create_repository(&types::NewRepository {
                    name: "persisted".to_string(),
                    github_url: "https://github.com/acme/persisted".to_string(),
                    clone_url: None,
                    branch: Some("develop".to_string()),
                    owner_id: None,
                    metadata: None,
                })
                .await
                .unwrap();
        }
        let store = RecordStore::open(&path).await.unwrap();
        assert_eq!(store.list_repositories().await.unwrap().len(), 1);
    }
}
