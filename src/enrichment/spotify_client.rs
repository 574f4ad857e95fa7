//! Spotify Web API client.
//!
//! Owns the client-credentials token lifecycle and the batched
//! "get several tracks/artists" endpoints. HTTP-level failures surface as
//! `ClientError` so the enrichment orchestrator can retry them
//! specifically.

use super::token_cache::TokenCache;
use crate::config::SpotifySettings;
use anyhow::Result;
use async_trait::async_trait;
use base64::prelude::{Engine, BASE64_STANDARD};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const TOKEN_CACHE_KEY: &str = "spotify_access_token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport-level failure of a metadata API call. Distinguished from
/// programming errors so the retry policy can target it.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no access token available")]
    Unauthorized,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),
}

/// Batched metadata lookups, up to 50 ids per call.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn get_several_tracks(&self, ids: &[String]) -> Result<JsonValue, ClientError>;

    async fn get_several_artists(&self, ids: &[String]) -> Result<JsonValue, ClientError>;
}

pub struct SpotifyClient {
    http: reqwest::Client,
    api_base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token_refresh_margin: Duration,
    token_cache: Arc<dyn TokenCache>,
}

impl SpotifyClient {
    pub fn new(settings: &SpotifySettings, token_cache: Arc<dyn TokenCache>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base_url: settings.api_base_url.clone(),
            token_url: settings.token_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token_refresh_margin: Duration::from_secs(settings.token_refresh_margin_secs),
            token_cache,
        })
    }

    /// Return a valid access token, refreshing it through the
    /// client-credentials grant when the cached one is absent or expired.
    /// Failures are logged and surface as `None`, never as an error.
    pub async fn get_access_token(&self) -> Option<String> {
        if let Some(token) = self.token_cache.get(TOKEN_CACHE_KEY) {
            return Some(token);
        }

        debug!("No cached access token, requesting a new one");
        let auth = BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = match self
            .http
            .post(&self.token_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to request access token: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            error!("Token endpoint returned status {}", response.status());
            return None;
        }

        let body: JsonValue = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to decode token response: {}", e);
                return None;
            }
        };

        let (token, expires_in) = match parse_token_response(&body) {
            Some(parsed) => parsed,
            None => {
                error!("Missing required token data in response");
                return None;
            }
        };

        // Expire the cached token a safety margin before the real expiry.
        let ttl = Duration::from_secs(expires_in).saturating_sub(self.token_refresh_margin);
        self.token_cache.set(TOKEN_CACHE_KEY, &token, ttl);

        Some(token)
    }

    async fn get_batch(&self, path: &str, ids: &[String]) -> Result<JsonValue, ClientError> {
        let token = self
            .get_access_token()
            .await
            .ok_or(ClientError::Unauthorized)?;

        let url = format!("{}/v1/{}", self.api_base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("ids", ids.join(","))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("GET {} returned status {}", url, status);
            return Err(ClientError::Status(status));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MetadataFetcher for SpotifyClient {
    async fn get_several_tracks(&self, ids: &[String]) -> Result<JsonValue, ClientError> {
        self.get_batch("tracks", ids).await
    }

    async fn get_several_artists(&self, ids: &[String]) -> Result<JsonValue, ClientError> {
        self.get_batch("artists", ids).await
    }
}

/// Extract `(access_token, expires_in)` from a token endpoint response.
fn parse_token_response(body: &JsonValue) -> Option<(String, u64)> {
    let token = body.get("access_token")?.as_str()?;
    let expires_in = body.get("expires_in")?.as_u64()?;
    if token.is_empty() {
        return None;
    }
    Some((token.to_string(), expires_in))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_token_response() {
        let body = json!({"access_token": "abc", "expires_in": 3600, "token_type": "Bearer"});
        assert_eq!(
            parse_token_response(&body),
            Some(("abc".to_string(), 3600))
        );
    }

    #[test]
    fn test_parse_token_response_incomplete() {
        assert_eq!(parse_token_response(&json!({"expires_in": 3600})), None);
        assert_eq!(parse_token_response(&json!({"access_token": "abc"})), None);
        assert_eq!(
            parse_token_response(&json!({"access_token": "", "expires_in": 3600})),
            None
        );
        assert_eq!(
            parse_token_response(&json!({"access_token": "abc", "expires_in": "soon"})),
            None
        );
    }
}
