//! Background pipeline worker.
//!
//! Upload handlers enqueue job batches here; the worker runs the ingestion
//! service over each batch and then kicks off a metadata enrichment run for
//! the catalog, bounded by the configured time budget. Work is
//! fire-and-forget: failures are logged, never returned to the uploader.

use crate::catalog_store::SqliteCatalogStore;
use crate::config::EnrichmentSettings;
use crate::enrichment::EnrichmentProcessor;
use crate::ingestion::{FileIngestionService, SqliteUploadStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum PipelineCommand {
    ProcessUploads { job_ids: Vec<String> },
}

/// Spawn the pipeline worker task and return its command sender.
pub fn spawn_pipeline_worker(
    uploads: Arc<SqliteUploadStore>,
    catalog: Arc<SqliteCatalogStore>,
    processor: Option<EnrichmentProcessor>,
    settings: EnrichmentSettings,
) -> mpsc::Sender<PipelineCommand> {
    let (tx, mut rx) = mpsc::channel::<PipelineCommand>(64);

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                PipelineCommand::ProcessUploads { job_ids } => {
                    run_pipeline(&uploads, &catalog, processor.as_ref(), &settings, job_ids).await;
                }
            }
        }
        debug!("Pipeline worker shutting down");
    });

    tx
}

async fn run_pipeline(
    uploads: &Arc<SqliteUploadStore>,
    catalog: &Arc<SqliteCatalogStore>,
    processor: Option<&EnrichmentProcessor>,
    settings: &EnrichmentSettings,
    job_ids: Vec<String>,
) {
    info!("Processing {} upload jobs", job_ids.len());
    let service = FileIngestionService::new(uploads.clone(), catalog.clone());
    let ingest = tokio::task::spawn_blocking(move || service.process_jobs(&job_ids));
    if let Err(e) = ingest.await {
        error!("Ingestion task panicked: {}", e);
        return;
    }

    let Some(processor) = processor else {
        debug!("Metadata enrichment disabled, skipping");
        return;
    };

    let catalog = catalog.clone();
    let track_ids = match tokio::task::spawn_blocking(move || catalog.all_track_ids()).await {
        Ok(Ok(ids)) => ids,
        Ok(Err(e)) => {
            error!("Failed to list track ids for enrichment: {:#}", e);
            return;
        }
        Err(e) => {
            error!("Track listing task panicked: {}", e);
            return;
        }
    };

    let started = Instant::now();
    let hard_limit = Duration::from_secs(settings.hard_time_limit_secs);
    match tokio::time::timeout(hard_limit, processor.enrich_tracks(&track_ids)).await {
        Ok(Ok(())) => {
            let elapsed = started.elapsed();
            if elapsed > Duration::from_secs(settings.soft_time_limit_secs) {
                warn!(
                    "Enrichment run took {:?}, over the {}s soft limit",
                    elapsed, settings.soft_time_limit_secs
                );
            }
            info!("Enrichment run finished in {:?}", elapsed);
        }
        Ok(Err(e)) => error!("Enrichment run failed: {:#}", e),
        Err(_) => error!(
            "Enrichment run exceeded the {}s hard limit, abandoned",
            settings.hard_time_limit_secs
        ),
    }
}
