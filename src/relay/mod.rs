//! HLS-aware streaming relay.
//!
//! Fetches manifests, segments, subtitles and images for browsers that cannot
//! reach the origin directly, cycling through referer/origin strategies until
//! the upstream accepts one, and remembering the winner per host.

pub mod attempts;
pub mod cache_policy;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod manifest;
pub mod memory;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::{Client, Url};
use tracing::{debug, warn};

pub use attempts::AttemptStrategy;
pub use cache_policy::{CacheMode, ResourceClass};
pub use error::RelayError;
pub use memory::HostAttemptMemory;

use self::{
    attempts::{build_attempts, prioritize},
    cache_policy::resolve_cache_control,
    fetch::{FetchFailure, Fetcher, is_retryable},
    headers::{MANIFEST_CONTENT_TYPE, PASS_THROUGH, VTT_CONTENT_TYPE, apply_cors, attempt_headers},
    manifest::{is_manifest_content_type, rewrite_manifest},
};
use crate::{common::http::HttpClient, configs::RelayConfig};

/// A validated relay call.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub target: Url,
    pub referer: Option<String>,
    pub host_override: Option<String>,
    pub range: Option<String>,
}

impl RelayRequest {
    /// Validates the raw target. Query decoding turns `+` into spaces, so
    /// spaces are put back before parsing.
    pub fn new(
        target: Option<&str>,
        referer: Option<&str>,
        host_override: Option<&str>,
        range: Option<&str>,
    ) -> Result<Self, RelayError> {
        let raw = target
            .map(|t| t.replace(' ', "+"))
            .filter(|t| !t.is_empty())
            .ok_or(RelayError::InvalidInput)?;

        let target = Url::parse(&raw).map_err(|_| RelayError::InvalidInput)?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(RelayError::InvalidInput);
        }

        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);

        Ok(Self {
            target,
            referer: non_empty(referer),
            host_override: non_empty(host_override),
            range: non_empty(range),
        })
    }

    /// `host[:port]` of the target, the key for attempt memory.
    pub fn host_key(&self) -> Option<String> {
        let host = self.target.host_str()?;
        Some(match self.target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    fn is_manifest(&self, content_type: &str) -> bool {
        self.target.as_str().contains(".m3u8") || is_manifest_content_type(content_type)
    }

    fn is_vtt(&self) -> bool {
        self.target.path().to_ascii_lowercase().ends_with(".vtt")
    }
}

pub enum RelayBody {
    /// Rewritten manifest text.
    Text(String),
    /// Upstream body, streamed as received.
    Stream(reqwest::Response),
}

pub struct RelayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: RelayBody,
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            RelayBody::Text(text) => Body::from(text),
            RelayBody::Stream(upstream) => Body::from_stream(upstream.bytes_stream()),
        };
        (self.status, self.headers, body).into_response()
    }
}

pub struct Relay {
    client: Client,
    config: RelayConfig,
    memory: HostAttemptMemory,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(config, HttpClient::new_relay()?))
    }

    pub fn with_client(config: RelayConfig, client: Client) -> Self {
        let memory = HostAttemptMemory::new(config.memory_capacity);
        Self {
            client,
            config,
            memory,
        }
    }

    pub fn memory(&self) -> &HostAttemptMemory {
        &self.memory
    }

    pub async fn relay(&self, request: &RelayRequest) -> Result<RelayResponse, RelayError> {
        let referer = request
            .referer
            .as_deref()
            .unwrap_or(&self.config.default_referer);
        let host = request.host_key();
        let preferred = host.as_deref().and_then(|h| self.memory.get(h));
        let attempts = prioritize(
            build_attempts(referer, &request.target, &self.config.known_referers),
            preferred.as_deref(),
        );

        let fetcher = Fetcher {
            client: &self.client,
            timeout: self.config.timeout(),
            max_redirects: self.config.max_redirects,
            retry_count: self.config.retry_count,
        };

        let mut upstream: Option<reqwest::Response> = None;
        let mut failure: Option<FetchFailure> = None;

        for attempt in &attempts {
            let headers = attempt_headers(
                attempt,
                request.range.as_deref(),
                request.host_override.as_deref(),
            );

            match fetcher.fetch(&request.target, &headers).await {
                Ok(response) => {
                    let status = response.status();
                    let retryable = is_retryable(status);
                    debug!(
                        "Relay {} via {} -> {}",
                        request.target,
                        attempt.signature(),
                        status
                    );

                    if !retryable && status.is_success() {
                        if let Some(host) = &host {
                            self.memory.remember(host, &attempt.signature());
                        }
                    }

                    upstream = Some(response);
                    if !retryable {
                        break;
                    }
                }
                Err(e) => {
                    debug!(
                        "Relay {} via {} failed: {:?}",
                        request.target,
                        attempt.signature(),
                        e
                    );
                    failure = Some(e);
                }
            }
        }

        let upstream = match upstream {
            Some(response) if response.status().is_success() && !is_retryable(response.status()) => {
                response
            }
            Some(response) => {
                warn!(
                    "Relay {} rejected after {} attempt(s): {}",
                    request.target,
                    attempts.len(),
                    response.status()
                );
                return Err(RelayError::UpstreamRejected {
                    status: response.status(),
                });
            }
            None => {
                warn!("Relay {} failed: {:?}", request.target, failure);
                return Err(match failure {
                    Some(FetchFailure::Timeout) => RelayError::UpstreamTimeout,
                    Some(FetchFailure::Network(e)) => RelayError::UpstreamUnreachable(e.to_string()),
                    None => RelayError::UpstreamUnreachable("no attempts".to_string()),
                });
            }
        };

        self.respond(request, upstream).await
    }

    async fn respond(
        &self,
        request: &RelayRequest,
        upstream: reqwest::Response,
    ) -> Result<RelayResponse, RelayError> {
        let status = upstream.status();
        let upstream_headers = upstream.headers();
        let content_type = upstream_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let is_manifest = request.is_manifest(&content_type);

        let mut headers = HeaderMap::new();
        if let Some(value) = upstream_headers.get(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, value.clone());
        }
        // upstreams label WebVTT as octet-stream, which <track> refuses
        if request.is_vtt() {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(VTT_CONTENT_TYPE));
        }

        let class = ResourceClass::classify(request.target.path(), &content_type);
        let upstream_cache = upstream_headers
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok());
        if let Some(value) = resolve_cache_control(self.config.cache_mode, class, upstream_cache)
            .and_then(|v| HeaderValue::from_str(&v).ok())
        {
            headers.insert(header::CACHE_CONTROL, value);
        }

        for name in &PASS_THROUGH {
            // the rewritten manifest has its own length
            if is_manifest && (*name == header::CONTENT_LENGTH || *name == header::CONTENT_RANGE) {
                continue;
            }
            if let Some(value) = upstream_headers.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        apply_cors(&mut headers);

        if !is_manifest {
            return Ok(RelayResponse {
                status,
                headers,
                body: RelayBody::Stream(upstream),
            });
        }

        let manifest = match tokio::time::timeout(self.config.timeout(), upstream.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(RelayError::UpstreamUnreachable(e.to_string())),
            Err(_) => return Err(RelayError::UpstreamTimeout),
        };
        if content_type.is_empty() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
            );
        }

        Ok(RelayResponse {
            status,
            headers,
            body: RelayBody::Text(rewrite_manifest(&manifest, &request.target)),
        })
    }
}
