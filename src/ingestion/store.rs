//! SQLite store for upload jobs.

use super::models::{JobStatus, UploadJob};
use super::schema::UPLOADS_SCHEMA_SQL;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed store for upload jobs and their raw file content.
#[derive(Clone)]
pub struct SqliteUploadStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUploadStore {
    /// Open or create an uploads database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open uploads database: {:?}", path.as_ref()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Create an in-memory uploads database (used by tests).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(UPLOADS_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new pending job holding the uploaded file content.
    pub fn create_job(&self, user_id: &str, filename: &str, content: &[u8]) -> Result<UploadJob> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO upload_jobs (id, user_id, filename, content, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, user_id, filename, content, JobStatus::Pending.to_db_str(), now],
        )?;
        Ok(UploadJob {
            id,
            user_id: user_id.to_string(),
            filename: filename.to_string(),
            status: JobStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a job by id (without its file content).
    pub fn get_job(&self, id: &str) -> Result<Option<UploadJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, filename, status, error, created_at, updated_at
             FROM upload_jobs WHERE id = ?1",
        )?;
        let job = stmt.query_row(params![id], Self::parse_job_row).optional()?;
        Ok(job)
    }

    /// Load the raw file content of a job.
    pub fn get_job_content(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT content FROM upload_jobs WHERE id = ?1")?;
        let content = stmt
            .query_row(params![id], |r| r.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(content)
    }

    /// Update a job's status; `error` is stored for failed jobs and cleared
    /// otherwise.
    pub fn update_status(&self, id: &str, status: JobStatus, error: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE upload_jobs SET status = ?1, error = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.to_db_str(), error, now, id],
        )?;
        Ok(())
    }

    /// List jobs for a user, most recent first.
    pub fn list_jobs_by_user(&self, user_id: &str, limit: usize) -> Result<Vec<UploadJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, filename, status, error, created_at, updated_at
             FROM upload_jobs WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let jobs = stmt
            .query_map(params![user_id, limit as i64], Self::parse_job_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Delete a job and its stored file content.
    pub fn delete_job(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM upload_jobs WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn parse_job_row(row: &rusqlite::Row) -> rusqlite::Result<UploadJob> {
        let status_str: String = row.get(3)?;
        Ok(UploadJob {
            id: row.get(0)?,
            user_id: row.get(1)?,
            filename: row.get(2)?,
            status: JobStatus::from_db_str(&status_str),
            error: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}
