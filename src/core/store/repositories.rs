use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

use super::types::{NewRepository, RepositoryRecord};
use super::{RecordStore, json_column};

const REPOSITORY_COLUMNS: &str =
    "id, name, github_url, clone_url, branch, owner_id, metadata, created_at, updated_at";

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<RepositoryRecord> {
    Ok(RepositoryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        github_url: row.get(2)?,
        clone_url: row.get(3)?,
        branch: row.get(4)?,
        owner_id: row.get(5)?,
        metadata: json_column(row.get(6)?),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl RecordStore {
    pub async fn create_repository(&self, repo: &NewRepository) -> Result<RepositoryRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let branch = repo
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or("main");
        let metadata = repo
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO repositories (id, name, github_url, clone_url, branch, owner_id, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                repo.name,
                repo.github_url,
                repo.clone_url,
                branch,
                repo.owner_id,
                metadata.to_string()
            ],
        )?;
        let rec = db.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?1"),
            params![id],
            repository_from_row,
        )?;
        Ok(rec)
    }

    pub async fn get_repository(&self, id: &str) -> Result<Option<RepositoryRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?1"),
                params![id],
                repository_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], repository_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn delete_repository(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
