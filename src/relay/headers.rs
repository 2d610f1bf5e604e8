use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

use super::attempts::AttemptStrategy;

pub const ACCEPT: &str = "application/vnd.apple.mpegurl,application/x-mpegURL,*/*";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
pub const VTT_CONTENT_TYPE: &str = "text/vtt; charset=utf-8";
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Upstream headers copied verbatim onto the relayed response.
pub static PASS_THROUGH: [HeaderName; 5] = [
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::ETAG,
    header::LAST_MODIFIED,
];

static CORS: [(HeaderName, &str); 5] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (
        header::ACCESS_CONTROL_ALLOW_METHODS,
        "GET, HEAD, POST, OPTIONS",
    ),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Range"),
    (
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        "Content-Type, Content-Length, Content-Range, Accept-Ranges, Cache-Control, ETag, Last-Modified",
    ),
    (header::VARY, "Origin"),
];

pub fn apply_cors(headers: &mut HeaderMap) {
    for (name, value) in &CORS {
        headers.insert(name.clone(), HeaderValue::from_static(*value));
    }
}

pub fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    apply_cors(&mut headers);
    headers
}

/// Request headers for one upstream attempt.
pub fn attempt_headers(
    attempt: &AttemptStrategy,
    range: Option<&str>,
    host_override: Option<&str>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE),
    );

    if let Some(referer) = attempt
        .referer
        .as_deref()
        .and_then(|r| HeaderValue::from_str(r).ok())
    {
        headers.insert(header::REFERER, referer);
        if let Some(origin) = attempt
            .origin()
            .and_then(|o| HeaderValue::from_str(&o).ok())
        {
            headers.insert(header::ORIGIN, origin);
        }
    }

    if let Some(range) = range.and_then(|r| HeaderValue::from_str(r).ok()) {
        headers.insert(header::RANGE, range);
    }

    // invalid overrides are dropped rather than failing the attempt
    if let Some(host) = host_override.and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert(header::HOST, host);
    }

    headers
}
