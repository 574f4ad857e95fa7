//! File ingestion service.
//!
//! Drives upload jobs through `pending → processing → {completed, failed}`.
//! Individual record rejections never fail a job; only file-level errors
//! (or storage failures) do, and a failing job never takes down the batch
//! runner for its siblings.

use super::models::{IngestReport, JobStatus, UploadJob};
use super::store::SqliteUploadStore;
use super::validator::validate_record;
use crate::catalog_store::{ListeningEventRow, SqliteCatalogStore};
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// File-level content errors that fail a whole job.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid JSON in upload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a top-level array of records")]
    NotAnArray,
}

pub struct FileIngestionService {
    uploads: Arc<SqliteUploadStore>,
    catalog: Arc<SqliteCatalogStore>,
}

impl FileIngestionService {
    pub fn new(uploads: Arc<SqliteUploadStore>, catalog: Arc<SqliteCatalogStore>) -> Self {
        Self { uploads, catalog }
    }

    /// Process a batch of jobs, one at a time. Every job reaches a terminal
    /// status exactly once; errors are absorbed per job.
    pub fn process_jobs(&self, job_ids: &[String]) {
        for job_id in job_ids {
            let job = match self.uploads.get_job(job_id) {
                Ok(Some(job)) => job,
                Ok(None) => {
                    warn!("Upload job {} not found, skipping", job_id);
                    continue;
                }
                Err(e) => {
                    error!("Failed to load upload job {}: {:#}", job_id, e);
                    continue;
                }
            };

            if job.status.is_terminal() {
                warn!("Upload job {} is already {:?}, skipping", job.id, job.status);
                continue;
            }

            if let Err(e) = self
                .uploads
                .update_status(&job.id, JobStatus::Processing, None)
            {
                error!("Failed to mark job {} as processing: {:#}", job.id, e);
                continue;
            }

            let (status, err_msg) = match self.process_job(&job) {
                Ok(report) => {
                    info!(
                        "Job {} completed: {}/{} records accepted, {} events inserted",
                        job.id, report.accepted_records, report.total_records, report.events_inserted
                    );
                    (JobStatus::Completed, None)
                }
                Err(e) => {
                    error!("Job {} failed: {:#}", job.id, e);
                    (JobStatus::Failed, Some(format!("{:#}", e)))
                }
            };

            if let Err(e) = self
                .uploads
                .update_status(&job.id, status, err_msg.as_deref())
            {
                error!("Failed to finalize status of job {}: {:#}", job.id, e);
            }
        }
    }

    /// Process one job: parse, validate every record, create unseen track
    /// stubs, then bulk-insert the listening events.
    fn process_job(&self, job: &UploadJob) -> Result<IngestReport> {
        let content = self
            .uploads
            .get_job_content(&job.id)?
            .context("Job file content missing")?;
        let records = parse_file_content(&content)?;

        let mut report = IngestReport {
            total_records: records.len(),
            ..Default::default()
        };

        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut track_stubs: Vec<(String, String)> = Vec::new();
        // (external id, played_at millis, ms_played), not yet resolved to rows
        let mut events: Vec<(String, i64, i64)> = Vec::new();

        for record in &records {
            let validated = match validate_record(record) {
                Some(validated) => validated,
                None => {
                    report.rejected_records += 1;
                    continue;
                }
            };
            report.accepted_records += 1;

            if seen_ids.insert(validated.external_track_id.clone()) {
                track_stubs.push((
                    validated.external_track_id.clone(),
                    validated.track_name.clone(),
                ));
            }
            events.push((
                validated.external_track_id,
                validated.played_at.timestamp_millis(),
                validated.ms_played,
            ));
        }

        self.catalog.create_track_stubs(&track_stubs)?;

        let ids: Vec<String> = seen_ids.into_iter().collect();
        let rowids = self.catalog.track_rowids(&ids)?;

        let rows: Vec<ListeningEventRow> = events
            .into_iter()
            .filter_map(|(track_id, played_at, ms_played)| match rowids.get(&track_id) {
                Some(rowid) => Some(ListeningEventRow {
                    track_rowid: *rowid,
                    played_at,
                    ms_played,
                }),
                None => {
                    debug!("Dropping event for unresolved track {}", track_id);
                    None
                }
            })
            .collect();

        report.events_inserted = self.catalog.insert_listening_events(&job.user_id, &rows)?;

        Ok(report)
    }
}

fn parse_file_content(content: &[u8]) -> Result<Vec<JsonValue>, IngestError> {
    let parsed: JsonValue = serde_json::from_slice(content)?;
    match parsed {
        JsonValue::Array(records) => Ok(records),
        _ => Err(IngestError::NotAnArray),
    }
}
