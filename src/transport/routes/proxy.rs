use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    relay::{RelayRequest, headers::cors_headers},
    server::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
    /// Short alias for `url`.
    pub u: Option<String>,
    pub referer: Option<String>,
    pub host: Option<String>,
}

impl ProxyQuery {
    /// `url`, or `u` when `url` is missing or empty.
    pub fn target(&self) -> Option<&str> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        non_empty(&self.url).or_else(|| non_empty(&self.u))
    }
}

pub async fn proxy_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProxyQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    tracing::info!(
        "GET /proxy url={:?} referer={:?} Range={:?}",
        params.target(),
        params.referer,
        range
    );

    let request = match RelayRequest::new(
        params.target(),
        params.referer.as_deref(),
        params.host.as_deref(),
        range,
    ) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("GET /proxy: {}", e);
            return e.into_response();
        }
    };

    match state.relay.relay(&request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::warn!("GET /proxy {}: {}", request.target, e);
            e.into_response()
        }
    }
}

/// CORS preflight.
pub async fn proxy_options() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, cors_headers())
}
