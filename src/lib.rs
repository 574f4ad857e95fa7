//! Replay Stats Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog_store;
pub mod config;
pub mod enrichment;
pub mod ingestion;
pub mod server;
pub mod worker;

// Re-export commonly used types for convenience
pub use catalog_store::SqliteCatalogStore;
pub use config::{AppConfig, CliConfig};
pub use enrichment::{EnrichmentProcessor, InMemoryTokenCache, SpotifyClient};
pub use ingestion::{FileIngestionService, SqliteUploadStore};
pub use server::{run_server, ServerState};
pub use worker::{spawn_pipeline_worker, PipelineCommand};
