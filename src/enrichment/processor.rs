//! Metadata enrichment orchestrator.
//!
//! Two sequential phases per run: track metadata, then artist cover-art
//! backfill. Within a phase all batches run as concurrent tasks over one
//! shared aggregator; a batch that keeps failing at the transport level is
//! dropped after its retries without affecting its siblings. Only the final
//! persistence step is allowed to fail the whole run.

use super::aggregator::MetadataAggregator;
use super::retry_policy::RetryPolicy;
use super::spotify_client::{ClientError, MetadataFetcher};
use crate::catalog_store::SqliteCatalogStore;
use crate::config::EnrichmentSettings;
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct EnrichmentProcessor {
    fetcher: Arc<dyn MetadataFetcher>,
    catalog: Arc<SqliteCatalogStore>,
    batch_size: usize,
    retry_policy: RetryPolicy,
}

enum BatchKind {
    Tracks,
    Artists,
}

impl BatchKind {
    fn payload_key(&self) -> &'static str {
        match self {
            BatchKind::Tracks => "tracks",
            BatchKind::Artists => "artists",
        }
    }
}

impl EnrichmentProcessor {
    pub fn new(
        fetcher: Arc<dyn MetadataFetcher>,
        catalog: Arc<SqliteCatalogStore>,
        settings: &EnrichmentSettings,
    ) -> Self {
        Self {
            fetcher,
            catalog,
            batch_size: settings.batch_size,
            retry_policy: RetryPolicy::new(
                settings.max_attempts,
                std::time::Duration::from_secs(settings.retry_delay_secs),
            ),
        }
    }

    /// Run a full enrichment pass over the given track ids: fetch and
    /// persist track/album/artist metadata, then backfill missing artist
    /// covers.
    pub async fn enrich_tracks(&self, track_ids: &[String]) -> Result<()> {
        info!(
            "Enriching metadata for {} tracks in batches of {}",
            track_ids.len(),
            self.batch_size
        );

        let aggregator = Arc::new(Mutex::new(MetadataAggregator::new()));
        self.run_batches(track_ids, BatchKind::Tracks, &aggregator)
            .await;

        let data = aggregator.lock().unwrap().flush();
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || catalog.save_enrichment(&data))
            .await
            .context("Enrichment persist task failed")??;

        self.backfill_artist_covers().await
    }

    /// Phase 2: fetch full artist objects for every artist still missing
    /// cover art and bulk-update the covers.
    pub async fn backfill_artist_covers(&self) -> Result<()> {
        let catalog = self.catalog.clone();
        let artist_ids = tokio::task::spawn_blocking(move || catalog.artists_missing_cover())
            .await
            .context("Cover lookup task failed")??;

        if artist_ids.is_empty() {
            return Ok(());
        }
        info!("Backfilling covers for {} artists", artist_ids.len());

        let aggregator = Arc::new(Mutex::new(MetadataAggregator::new()));
        self.run_batches(&artist_ids, BatchKind::Artists, &aggregator)
            .await;

        let data = aggregator.lock().unwrap().flush();
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || catalog.update_artist_covers(&data.artists))
            .await
            .context("Cover update task failed")??;

        Ok(())
    }

    /// Fan out one phase's batches as concurrent tasks and wait for all of
    /// them. A panicking batch task is logged and dropped like a failed one.
    async fn run_batches(
        &self,
        ids: &[String],
        kind: BatchKind,
        aggregator: &Arc<Mutex<MetadataAggregator>>,
    ) {
        let kind = Arc::new(kind);
        let handles: Vec<_> = ids
            .chunks(self.batch_size)
            .map(|batch| {
                let this = self.clone();
                let aggregator = aggregator.clone();
                let kind = kind.clone();
                let batch = batch.to_vec();
                tokio::spawn(async move { this.process_batch(&batch, &kind, &aggregator).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Batch task panicked: {}", e);
            }
        }
    }

    /// Fetch one batch with retries. After the retry budget is exhausted the
    /// batch's contribution is simply absent from the aggregate.
    async fn process_batch(
        &self,
        batch: &[String],
        kind: &BatchKind,
        aggregator: &Mutex<MetadataAggregator>,
    ) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_batch(batch, kind, aggregator).await {
                Ok(()) => return,
                Err(e) => {
                    if self.retry_policy.should_retry(attempts) {
                        info!(
                            "Retrying {} batch in {:?} (attempt #{}): {}",
                            kind.payload_key(),
                            self.retry_policy.delay,
                            attempts,
                            e
                        );
                        tokio::time::sleep(self.retry_policy.delay).await;
                    } else {
                        warn!(
                            "Dropping {} batch of {} ids after {} attempts: {}",
                            kind.payload_key(),
                            batch.len(),
                            attempts,
                            e
                        );
                        return;
                    }
                }
            }
        }
    }

    async fn try_batch(
        &self,
        batch: &[String],
        kind: &BatchKind,
        aggregator: &Mutex<MetadataAggregator>,
    ) -> Result<(), ClientError> {
        let payload = match kind {
            BatchKind::Tracks => self.fetcher.get_several_tracks(batch).await?,
            BatchKind::Artists => self.fetcher.get_several_artists(batch).await?,
        };

        let entries = payload
            .get(kind.payload_key())
            .and_then(JsonValue::as_array)
            .ok_or(ClientError::MalformedResponse("missing payload key"))?;

        let mut aggregator = aggregator.lock().unwrap();
        match kind {
            BatchKind::Tracks => aggregator.add_tracks(entries),
            BatchKind::Artists => aggregator.add_artists(entries),
        }
        Ok(())
    }
}
