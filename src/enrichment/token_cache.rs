//! Cache abstraction for short-lived access tokens.
//!
//! The client takes the cache as a constructor argument so tests can
//! substitute an in-memory fake and deployments can share a distributed
//! cache across worker processes without code change.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Get/set-with-ttl cache for string values. Implementations must be safe
/// to call from concurrently running tasks; a racy double-refresh is
/// acceptable, a torn value is not.
pub trait TokenCache: Send + Sync {
    /// Return the cached value if present and not expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value that expires after `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Duration);
}

/// Process-local token cache.
#[derive(Default)]
pub struct InMemoryTokenCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }
}
