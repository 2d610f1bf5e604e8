use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::relay::cache_policy::CacheMode;

/// Lowest per-call timeout accepted from configuration.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    #[serde(default)]
    pub cache_mode: CacheMode,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_referer")]
    pub default_referer: String,
    #[serde(default = "default_known_referers")]
    pub known_referers: Vec<String>,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::default(),
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            default_referer: default_referer(),
            known_referers: default_known_referers(),
            max_redirects: default_max_redirects(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

impl RelayConfig {
    /// Clamps values read from files or the environment to their floors.
    pub fn normalized(mut self) -> Self {
        self.timeout_ms = self.timeout_ms.max(MIN_TIMEOUT_MS);
        self.memory_capacity = self.memory_capacity.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_count() -> u32 {
    1
}

fn default_referer() -> String {
    "https://megacloud.tv".to_string()
}

fn default_known_referers() -> Vec<String> {
    vec![
        "https://hianime.to/".to_string(),
        "https://hianime.sx/".to_string(),
        "https://megacloud.tv/".to_string(),
    ]
}

fn default_max_redirects() -> usize {
    5
}

fn default_memory_capacity() -> usize {
    200
}
