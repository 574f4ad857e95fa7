//! Upload-job models.

use serde::Serialize;

/// Lifecycle of an upload job. Terminal states are never left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Convert from database string representation
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "PENDING" => JobStatus::Pending,
            "PROCESSING" => JobStatus::Processing,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Failed,
        }
    }

    /// Convert to database string representation
    pub fn to_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One uploaded export file awaiting (or past) processing. The raw file
/// content lives in the same row but is only loaded when a job is processed.
#[derive(Clone, Debug, Serialize)]
pub struct UploadJob {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub status: JobStatus,
    /// Short failure description, set only for failed jobs.
    pub error: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

/// Outcome counters for one processed job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub total_records: usize,
    pub accepted_records: usize,
    pub rejected_records: usize,
    pub events_inserted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_roundtrip() {
        let statuses = vec![
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ];
        for status in statuses {
            assert_eq!(JobStatus::from_db_str(status.to_db_str()), status);
        }
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
