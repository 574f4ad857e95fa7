mod models;
mod schema;
mod service;
mod store;
mod validator;

pub use models::{IngestReport, JobStatus, UploadJob};
pub use service::{FileIngestionService, IngestError};
pub use store::SqliteUploadStore;
pub use validator::{validate_record, ValidatedRecord};
