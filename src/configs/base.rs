use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*, relay::cache_policy::CacheMode};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub logging: Option<LoggingConfig>,
  #[serde(default)]
  pub relay: RelayConfig,
  #[serde(default)]
  pub resolver: ResolverConfig,
}

impl Config {
  pub fn load() -> AnyResult<Self> {
    let config_path = if std::path::Path::new("config.toml").exists() {
      "config.toml"
    } else if std::path::Path::new("config.default.toml").exists() {
      "config.default.toml"
    } else {
      crate::log_println!("No config.toml found, using built-in defaults");
      return Ok(Self::default().with_env(|key| std::env::var(key).ok()));
    };

    crate::log_println!("Loading configuration from: {}", config_path);

    let config_str = std::fs::read_to_string(config_path)?;
    Self::from_toml(&config_str).map(|config| config.with_env(|key| std::env::var(key).ok()))
  }

  pub fn from_toml(source: &str) -> AnyResult<Self> {
    let config: Config = toml::from_str(source)?;
    Ok(config)
  }

  /// Applies the runtime knobs (`PROXY_*`, `PORT`) on top of the file values
  /// and clamps the relay settings to their floors.
  pub fn with_env<F>(mut self, lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(mode) = lookup("PROXY_CACHE_MODE") {
      self.relay.cache_mode = CacheMode::from(mode);
    }
    if let Some(timeout_ms) = lookup("PROXY_TIMEOUT_MS").and_then(|v| parse_env_number(&v)) {
      self.relay.timeout_ms = timeout_ms as u64;
    }
    if let Some(retries) = lookup("PROXY_RETRY_COUNT").and_then(|v| parse_env_number(&v)) {
      self.relay.retry_count = retries as u32;
    }
    if let Some(port) = lookup("PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
      self.server.port = port;
    }

    self.relay = self.relay.normalized();
    self
  }
}

/// Finite, non-negative numbers only; anything else keeps the configured value.
fn parse_env_number(raw: &str) -> Option<f64> {
  raw
    .trim()
    .parse::<f64>()
    .ok()
    .filter(|v| v.is_finite())
    .map(|v| v.max(0.0))
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn empty_file_yields_defaults() {
    let config = Config::from_toml("").unwrap().with_env(env(&[]));
    assert_eq!(config.server.port, 3030);
    assert_eq!(config.relay.cache_mode, CacheMode::Bandwidth);
    assert_eq!(config.relay.timeout_ms, 10_000);
    assert_eq!(config.relay.retry_count, 1);
    assert_eq!(config.resolver.max_retries, 2);
    assert_eq!(config.resolver.fallback_providers.len(), 2);
  }

  #[test]
  fn env_overrides_are_clamped() {
    let config = Config::default().with_env(env(&[
      ("PROXY_CACHE_MODE", " Conservative "),
      ("PROXY_TIMEOUT_MS", "250"),
      ("PROXY_RETRY_COUNT", "-3"),
      ("PORT", "8080"),
    ]));
    assert_eq!(config.relay.cache_mode, CacheMode::Conservative);
    assert_eq!(config.relay.timeout_ms, 1_000);
    assert_eq!(config.relay.retry_count, 0);
    assert_eq!(config.server.port, 8080);
  }

  #[test]
  fn garbage_env_values_are_ignored() {
    let config = Config::default().with_env(env(&[
      ("PROXY_CACHE_MODE", "aggressive"),
      ("PROXY_TIMEOUT_MS", "soon"),
      ("PROXY_RETRY_COUNT", "NaN"),
    ]));
    assert_eq!(config.relay.cache_mode, CacheMode::Bandwidth);
    assert_eq!(config.relay.timeout_ms, 10_000);
    assert_eq!(config.relay.retry_count, 1);
  }

  #[test]
  fn toml_sections_are_read() {
    let source = r#"
      [relay]
      cache_mode = "off"
      retry_count = 3
      known_referers = []

      [resolver]
      base_url = "https://example.org"
      backoff_ms = 10

      [[resolver.fallback_providers]]
      name = "mirror"
      domain = "mirror.example"
    "#;
    let config = Config::from_toml(source).unwrap();
    assert_eq!(config.relay.cache_mode, CacheMode::Off);
    assert_eq!(config.relay.retry_count, 3);
    assert!(config.relay.known_referers.is_empty());
    assert_eq!(config.resolver.base_url, "https://example.org");
    assert_eq!(config.resolver.fallback_providers[0].name, "mirror");
  }
}
