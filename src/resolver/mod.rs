//! Resolves a player server selection into a playable HLS source.
//!
//! The primary path goes through the catalogue's ajax API and the embed
//! host's `getSources`, decrypting the payload when needed. Any failure there
//! drops to the fallback mirrors. Whole attempts are retried with a linear
//! backoff, and callers only ever see `Some` or `None`.

pub mod crypto;
pub mod error;
pub mod fallback;
pub mod key;
pub mod token;
pub mod types;

use std::sync::Arc;

use reqwest::{Url, header};
use serde_json::Value;
use tracing::{debug, error, warn};

pub use error::ResolveError;
pub use fallback::FallbackProvider;
pub use key::KeyCache;
pub use token::{PlayerTokenExtractor, TokenExtractor};
pub use types::{ResolvedSource, SelectedServer, SourceRequest, StreamLink};

use self::{crypto::decrypt_sources, fallback::FallbackChain, types::RawSources};
use crate::{common::http::HttpClient, configs::ResolverConfig};

/// Splits an embed link into `(base, source_id)`: the last path segment is
/// the id, everything before it (with the origin) is the base.
pub fn parse_embed_link(link: &str) -> Result<(String, String), ResolveError> {
    let invalid = || ResolveError::InvalidLink(link.to_string());
    let url = Url::parse(link).map_err(|_| invalid())?;

    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    let source_id = segments.pop().ok_or_else(invalid)?;
    if segments.is_empty() || !url.origin().is_tuple() {
        return Err(invalid());
    }

    let base = format!("{}/{}", url.origin().ascii_serialization(), segments.join("/"));
    Ok((base, source_id.to_string()))
}

pub struct SourceResolver {
    client: reqwest::Client,
    config: ResolverConfig,
    keys: KeyCache,
    tokens: Arc<dyn TokenExtractor>,
    fallback: FallbackChain,
}

impl SourceResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, reqwest::Error> {
        let client = HttpClient::new(config.timeout())?;
        let tokens = Arc::new(PlayerTokenExtractor::new(
            client.clone(),
            config.token_url.clone(),
            format!("{}/", config.base_url.trim_end_matches('/')),
        ));
        Ok(Self::with_parts(config, client, tokens))
    }

    pub fn with_parts(
        config: ResolverConfig,
        client: reqwest::Client,
        tokens: Arc<dyn TokenExtractor>,
    ) -> Self {
        let keys = KeyCache::new(client.clone(), config.key_url.clone(), config.key_ttl());
        let fallback = FallbackChain::new(client.clone(), config.fallback_providers.clone());
        Self {
            client,
            config,
            keys,
            tokens,
            fallback,
        }
    }

    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    /// Resolves a source, retrying the whole pipeline on failure. Returns
    /// `None` once every attempt has failed.
    pub async fn resolve(&self, request: &SourceRequest) -> Option<ResolvedSource> {
        let attempts = self.config.max_retries + 1;

        for attempt in 0..attempts {
            match self.try_resolve(request).await {
                Ok(resolved) => return Some(resolved),
                Err(e) => {
                    warn!(
                        "Resolving {} on {} failed (attempt {}/{}): {}",
                        request.id,
                        request.selected_server.name,
                        attempt + 1,
                        attempts,
                        e
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.config.backoff(attempt)).await;
                    }
                }
            }
        }

        error!(
            "Giving up on {} ({}) after {} attempts",
            request.id, request.selected_server.name, attempts
        );
        None
    }

    /// One pass through primary and fallback paths.
    pub async fn try_resolve(&self, request: &SourceRequest) -> Result<ResolvedSource, ResolveError> {
        let server = &request.selected_server;

        let (found, used_fallback) = match self.primary(&server.id).await {
            Ok(found) => (found, false),
            Err(e) => {
                debug!("Primary path failed for {}: {}, trying fallbacks", request.id, e);
                let found = self
                    .fallback
                    .resolve(request.episode_id(), &server.server_type, &server.name)
                    .await?;
                (found, true)
            }
        };

        let file = found.first_file().ok_or(ResolveError::InvalidSources)?.to_string();
        let field = |name: &str| found.raw.get(name).filter(|v| !v.is_null()).cloned();

        Ok(ResolvedSource {
            id: request.id.clone(),
            source_type: server.server_type.clone(),
            link: StreamLink {
                file,
                link_type: "hls".to_string(),
            },
            tracks: found
                .raw
                .get("tracks")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            intro: field("intro"),
            outro: field("outro"),
            server: server.name.clone(),
            used_fallback,
        })
    }

    async fn primary(&self, server_id: &str) -> Result<RawSources, ResolveError> {
        let ajax_url = format!(
            "{}/ajax/v2/episode/sources?id={}",
            self.config.base_url.trim_end_matches('/'),
            server_id
        );
        let ajax = self.get_json(&ajax_url, &[]).await?;
        let link = ajax
            .get("link")
            .and_then(Value::as_str)
            .filter(|l| !l.is_empty())
            .ok_or(ResolveError::MissingLink)?;
        let (base, source_id) = parse_embed_link(link)?;

        let player_url = format!("{}/{}?k=1&autoPlay=0&oa=0&asi=1", base, source_id);
        let token = self
            .tokens
            .extract(&player_url)
            .await
            .ok_or(ResolveError::TokenMissing)?;

        let sources_url = format!("{}/getSources?id={}&_k={}", base, source_id, token);
        let referer = format!("{}/{}", base, source_id);
        let data = self
            .get_json(
                &sources_url,
                &[
                    ("X-Requested-With", "XMLHttpRequest"),
                    (header::REFERER.as_str(), referer.as_str()),
                ],
            )
            .await?;

        let sources = match data.get("sources") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {
                return Err(ResolveError::SourcesMissing);
            }
            Some(Value::String(s)) if s.is_empty() => return Err(ResolveError::SourcesMissing),
            Some(payload) => self.normalize_sources(payload).await?,
        };

        let found = RawSources { sources, raw: data };
        if found.first_file().is_none() {
            return Err(ResolveError::InvalidSources);
        }
        Ok(found)
    }

    async fn normalize_sources(&self, payload: &Value) -> Result<Vec<Value>, ResolveError> {
        match payload {
            Value::Array(items) => Ok(items.clone()),
            Value::Object(map) if map.get("file").is_some_and(Value::is_string) => {
                Ok(vec![payload.clone()])
            }
            Value::String(encrypted) => {
                let key = self.keys.get().await?;
                decrypt_sources(encrypted, &key)
            }
            _ => Err(ResolveError::UnsupportedSources),
        }
    }

    async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Value, ResolveError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| ResolveError::http(url, e))?;
        if !response.status().is_success() {
            return Err(ResolveError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.json().await.map_err(|e| ResolveError::http(url, e))
    }
}
