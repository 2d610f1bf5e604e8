use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resolver::fallback::FallbackProvider;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_key_url")]
    pub key_url: String,
    #[serde(default = "default_key_ttl_secs")]
    pub key_ttl_secs: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_fallback_providers")]
    pub fallback_providers: Vec<FallbackProvider>,
    /// Optional HTTP service that turns a player URL into an access token.
    #[serde(default)]
    pub token_url: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key_url: default_key_url(),
            key_ttl_secs: default_key_ttl_secs(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            fallback_providers: default_fallback_providers(),
            token_url: None,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn key_ttl(&self) -> Duration {
        Duration::from_secs(self.key_ttl_secs)
    }

    /// Delay before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64 + 1))
    }
}

fn default_base_url() -> String {
    "https://hianime.to".to_string()
}

fn default_key_url() -> String {
    "https://raw.githubusercontent.com/ryanwtf88/megacloud-keys/refs/heads/master/key.txt"
        .to_string()
}

fn default_key_ttl_secs() -> u64 {
    3600
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    2_000
}

fn default_fallback_providers() -> Vec<FallbackProvider> {
    vec![
        FallbackProvider::new("megaplay", "megaplay.buzz"),
        FallbackProvider::new("vidwish", "vidwish.live"),
    ]
}
