//! TOML file configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML config file. Every field is optional; present values
/// override their CLI counterparts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub spotify: Option<SpotifyFileConfig>,
    pub enrichment: Option<EnrichmentFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyFileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base_url: Option<String>,
    pub token_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichmentFileConfig {
    pub batch_size: Option<usize>,
    pub max_attempts: Option<u32>,
    pub retry_delay_secs: Option<u64>,
    pub soft_time_limit_secs: Option<u64>,
    pub hard_time_limit_secs: Option<u64>,
    pub token_refresh_margin_secs: Option<u64>,
}

impl FileConfig {
    /// Load and parse a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
db_dir = "/data"
port = 4000

[spotify]
client_id = "id"
client_secret = "secret"

[enrichment]
batch_size = 25
max_attempts = 5
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_dir.as_deref(), Some("/data"));
        assert_eq!(config.port, Some(4000));

        let spotify = config.spotify.unwrap();
        assert_eq!(spotify.client_id.as_deref(), Some("id"));
        assert_eq!(spotify.api_base_url, None);

        let enrichment = config.enrichment.unwrap();
        assert_eq!(enrichment.batch_size, Some(25));
        assert_eq!(enrichment.max_attempts, Some(5));
        assert_eq!(enrichment.retry_delay_secs, None);
    }

    #[test]
    fn test_load_empty_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "").unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert!(config.db_dir.is_none());
        assert!(config.spotify.is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "this is {{ not toml").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(FileConfig::load("/nonexistent/config.toml").is_err());
    }
}
