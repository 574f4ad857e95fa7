//! SQLite schema for the upload-jobs database.

pub const UPLOADS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS upload_jobs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    content BLOB NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_upload_jobs_user ON upload_jobs(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_upload_jobs_status ON upload_jobs(status);
"#;
