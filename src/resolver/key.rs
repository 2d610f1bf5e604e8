use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::error::ResolveError;
use crate::common::types::SharedRw;

#[derive(Debug, Clone)]
struct CachedKey {
    value: String,
    fetched_at: Instant,
}

/// Decryption key fetched from a remote text file and kept for `ttl`.
///
/// When a refresh fails the previous key keeps being served, however old.
pub struct KeyCache {
    client: reqwest::Client,
    url: String,
    ttl: Duration,
    key: SharedRw<Option<CachedKey>>,
}

impl KeyCache {
    pub fn new(client: reqwest::Client, url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            ttl,
            key: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn get(&self) -> Result<String, ResolveError> {
        let cached = self.key.read().clone();
        if let Some(cached) = &cached {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        match self.fetch().await {
            Ok(value) => {
                debug!("Refreshed decryption key from {}", self.url);
                *self.key.write() = Some(CachedKey {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(value)
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!("Key refresh failed, reusing cached key: {}", e);
                    Ok(stale.value)
                }
                None => Err(ResolveError::KeyUnavailable(e.to_string())),
            },
        }
    }

    async fn fetch(&self) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ResolveError::http(&self.url, e))?;

        if !response.status().is_success() {
            return Err(ResolveError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ResolveError::http(&self.url, e))?;
        let key = text.trim();
        if key.is_empty() {
            return Err(ResolveError::KeyUnavailable("empty key file".to_string()));
        }
        Ok(key.to_string())
    }

    /// Installs a key as if it had just been fetched.
    pub fn prime(&self, value: impl Into<String>) {
        *self.key.write() = Some(CachedKey {
            value: value.into(),
            fetched_at: Instant::now(),
        });
    }

    pub fn clear(&self) {
        *self.key.write() = None;
    }
}
