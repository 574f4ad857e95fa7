use anyhow::{Context, Result};
use clap::Parser;
use replay_stats_server::catalog_store::SqliteCatalogStore;
use replay_stats_server::config::{AppConfig, CliConfig, FileConfig};
use replay_stats_server::enrichment::{EnrichmentProcessor, InMemoryTokenCache, SpotifyClient};
use replay_stats_server::ingestion::SqliteUploadStore;
use replay_stats_server::server::{run_server, ServerState};
use replay_stats_server::worker::spawn_pipeline_worker;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite database files.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to an optional TOML config file.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Spotify API client id (enables metadata enrichment).
    #[clap(long)]
    pub spotify_client_id: Option<String>,

    /// Spotify API client secret (enables metadata enrichment).
    #[clap(long)]
    pub spotify_client_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };

    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        port: cli_args.port,
        spotify_client_id: cli_args.spotify_client_id,
        spotify_client_secret: cli_args.spotify_client_secret,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening catalog database at {:?}...", config.catalog_db_path());
    let catalog = Arc::new(SqliteCatalogStore::open(config.catalog_db_path())?);
    info!(
        "Catalog ready: {} artists, {} albums, {} tracks",
        catalog.get_artists_count(),
        catalog.get_albums_count(),
        catalog.get_tracks_count()
    );

    info!("Opening uploads database at {:?}...", config.uploads_db_path());
    let uploads = Arc::new(SqliteUploadStore::open(config.uploads_db_path())?);

    let processor = match &config.spotify {
        Some(settings) => {
            let token_cache = Arc::new(InMemoryTokenCache::new());
            let client = Arc::new(SpotifyClient::new(settings, token_cache)?);
            Some(EnrichmentProcessor::new(
                client,
                catalog.clone(),
                &config.enrichment,
            ))
        }
        None => {
            warn!("No Spotify credentials configured, metadata enrichment is disabled");
            None
        }
    };

    let pipeline_tx = spawn_pipeline_worker(
        uploads.clone(),
        catalog.clone(),
        processor,
        config.enrichment.clone(),
    );

    let state = ServerState {
        uploads,
        catalog,
        pipeline_tx,
        start_time: Instant::now(),
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(state, config.port).await
}
