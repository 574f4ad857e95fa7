mod file_config;

pub use file_config::{EnrichmentFileConfig, FileConfig, SpotifyFileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that take part in config resolution. TOML config values
/// override these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

/// Spotify Web API settings. Present only when credentials are configured.
#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub api_base_url: String,
    pub token_url: String,
    pub token_refresh_margin_secs: u64,
}

/// Enrichment pipeline settings.
#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub soft_time_limit_secs: u64,
    pub hard_time_limit_secs: u64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_attempts: 3,
            retry_delay_secs: 2,
            soft_time_limit_secs: 300,
            hard_time_limit_secs: 360,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    /// None disables metadata enrichment entirely.
    pub spotify: Option<SpotifySettings>,
    pub enrichment: EnrichmentSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let spotify_file = file.spotify.unwrap_or_default();
        let enrichment_file = file.enrichment.unwrap_or_default();
        let enrichment_defaults = EnrichmentSettings::default();

        let client_id = spotify_file
            .client_id
            .or_else(|| cli.spotify_client_id.clone());
        let client_secret = spotify_file
            .client_secret
            .or_else(|| cli.spotify_client_secret.clone());

        // Enrichment is enabled only when both credentials are present.
        let spotify = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(SpotifySettings {
                client_id,
                client_secret,
                api_base_url: spotify_file
                    .api_base_url
                    .unwrap_or_else(|| "https://api.spotify.com".to_string()),
                token_url: spotify_file
                    .token_url
                    .unwrap_or_else(|| "https://accounts.spotify.com/api/token".to_string()),
                token_refresh_margin_secs: enrichment_file.token_refresh_margin_secs.unwrap_or(60),
            }),
            (None, None) => None,
            _ => {
                bail!("Both spotify client_id and client_secret must be provided together");
            }
        };

        let enrichment = EnrichmentSettings {
            batch_size: enrichment_file
                .batch_size
                .unwrap_or(enrichment_defaults.batch_size),
            max_attempts: enrichment_file
                .max_attempts
                .unwrap_or(enrichment_defaults.max_attempts),
            retry_delay_secs: enrichment_file
                .retry_delay_secs
                .unwrap_or(enrichment_defaults.retry_delay_secs),
            soft_time_limit_secs: enrichment_file
                .soft_time_limit_secs
                .unwrap_or(enrichment_defaults.soft_time_limit_secs),
            hard_time_limit_secs: enrichment_file
                .hard_time_limit_secs
                .unwrap_or(enrichment_defaults.hard_time_limit_secs),
        };

        Ok(Self {
            db_dir,
            port,
            spotify,
            enrichment,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn uploads_db_path(&self) -> PathBuf {
        self.db_dir.join("uploads.db")
    }
}
