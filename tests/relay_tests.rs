mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anistream::{
    configs::{RelayConfig, ResolverConfig},
    relay::{CacheMode, Relay, RelayRequest},
    resolver::SourceResolver,
    server::AppState,
    transport::http_server::router,
};
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, HeaderName, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use common::{body_text, closed_addr, header_value, spawn};
use parking_lot::Mutex;

type SeenHeaders = Arc<Mutex<Vec<(Option<String>, Option<String>)>>>;

fn relay_config() -> RelayConfig {
    RelayConfig {
        timeout_ms: 2_000,
        retry_count: 0,
        known_referers: Vec::new(),
        ..RelayConfig::default()
    }
}

fn relay(config: RelayConfig) -> Relay {
    Relay::new(config).unwrap()
}

fn request(url: &str, referer: Option<&str>) -> RelayRequest {
    RelayRequest::new(Some(url), referer, None, None).unwrap()
}

fn record(seen: &SeenHeaders, headers: &HeaderMap) {
    let get = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    seen.lock().push((get(header::REFERER), get(header::ORIGIN)));
}

#[tokio::test]
async fn rotates_strategies_and_remembers_the_winner() {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen: SeenHeaders = Arc::default();

    let app = Router::new().route(
        "/seg.ts",
        get({
            let hits = hits.clone();
            let seen = seen.clone();
            move |headers: HeaderMap| async move {
                record(&seen, &headers);
                if hits.fetch_add(1, Ordering::SeqCst) < 3 {
                    StatusCode::FORBIDDEN.into_response()
                } else {
                    "segment-bytes".into_response()
                }
            }
        }),
    );
    let addr = spawn(app).await;
    let target = format!("http://{}/seg.ts", addr);
    let target_origin = format!("http://{}", addr);

    let relay = relay(RelayConfig {
        known_referers: vec!["https://hianime.to/".into()],
        ..relay_config()
    });

    let response = relay
        .relay(&request(&target, Some("https://megacloud.tv/embed-2/e-1/abc")))
        .await
        .unwrap()
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "segment-bytes");

    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 4);
        assert_eq!(
            seen[0],
            (
                Some("https://megacloud.tv/".to_string()),
                Some("https://megacloud.tv".to_string())
            )
        );
        assert_eq!(seen[1], (Some("https://megacloud.tv/".to_string()), None));
        assert_eq!(
            seen[2],
            (Some(format!("{}/", target_origin)), Some(target_origin.clone()))
        );
        assert_eq!(seen[3], (Some(format!("{}/", target_origin)), None));
    }

    let host = addr.to_string();
    assert_eq!(
        relay.memory().get(&host),
        Some(format!("{}/|no-origin", target_origin))
    );

    // the remembered strategy goes first on the next call
    let response = relay
        .relay(&request(&target, Some("https://megacloud.tv/")))
        .await
        .unwrap()
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 5);
    assert_eq!(seen.lock()[4], (Some(format!("{}/", target_origin)), None));
}

#[tokio::test]
async fn retryable_statuses_become_bad_gateway() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/seg.ts",
        get({
            let hits = hits.clone();
            move || async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::TOO_MANY_REQUESTS
            }
        }),
    );
    let addr = spawn(app).await;

    let relay = relay(RelayConfig {
        retry_count: 1,
        ..relay_config()
    });
    let error = relay
        .relay(&request(&format!("http://{}/seg.ts", addr), None))
        .await
        .err()
        .unwrap();

    // default referer and target origin, each with and without Origin, plus
    // the bare attempt; every attempt is sent twice
    assert_eq!(hits.load(Ordering::SeqCst), 10);
    assert_eq!(error.status(), StatusCode::BAD_GATEWAY);

    let response = error.into_response();
    assert_eq!(header_value(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(body_text(response).await, "upstream fetch failed (429)");
    assert!(relay.memory().is_empty());
}

#[tokio::test]
async fn empty_204_is_reported() {
    let app = Router::new().route("/seg.ts", get(|| async { StatusCode::NO_CONTENT }));
    let addr = spawn(app).await;

    let response = relay(relay_config())
        .relay(&request(&format!("http://{}/seg.ts", addr), None))
        .await
        .err()
        .unwrap()
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_text(response).await,
        "upstream fetch failed (204 empty response)"
    );
}

#[tokio::test]
async fn terminal_status_is_mirrored_without_retrying() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/missing.ts",
        get({
            let hits = hits.clone();
            move || async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::NOT_FOUND
            }
        }),
    );
    let addr = spawn(app).await;

    let relay = relay(relay_config());
    let error = relay
        .relay(&request(&format!("http://{}/missing.ts", addr), None))
        .await
        .err()
        .unwrap();
    assert_eq!(error.status(), StatusCode::NOT_FOUND);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(relay.memory().is_empty());
}

#[tokio::test]
async fn manifest_is_rewritten_with_policy_headers() {
    let manifest = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n#EXTINF:4.0,\nseg-1.ts\n\n";
    let app = Router::new().route(
        "/hls/index.m3u8",
        get(move || async move {
            (
                [
                    (header::CONTENT_TYPE, "application/vnd.apple.mpegurl"),
                    (header::CACHE_CONTROL, "no-store"),
                    (header::ETAG, "\"v1\""),
                ],
                manifest,
            )
        }),
    );
    let addr = spawn(app).await;
    let base = format!("http://{}/hls", addr);

    let response = relay(relay_config())
        .relay(&request(&format!("{}/index.m3u8", base), None))
        .await
        .unwrap()
        .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_value(&response, "cache-control"),
        Some("public, max-age=6, s-maxage=6, stale-while-revalidate=15")
    );
    assert_eq!(
        header_value(&response, "content-type"),
        Some("application/vnd.apple.mpegurl")
    );
    assert_eq!(header_value(&response, "etag"), Some("\"v1\""));
    assert_eq!(header_value(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(header_value(&response, "vary"), Some("Origin"));

    assert_eq!(
        body_text(response).await,
        format!(
            "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"{base}/key.bin\"\n#EXTINF:4.0,\n{base}/seg-1.ts\n\n"
        )
    );
}

#[tokio::test]
async fn manifest_without_content_type_is_labelled() {
    let app = Router::new().route(
        "/playlist",
        get(|| async { Body::from("#EXTM3U\nchunk.ts") }),
    );
    let addr = spawn(app).await;

    let relay = relay(RelayConfig {
        cache_mode: CacheMode::Off,
        ..relay_config()
    });
    let response = relay
        .relay(&request(&format!("http://{}/playlist?f=a.m3u8", addr), None))
        .await
        .unwrap()
        .into_response();

    assert_eq!(
        header_value(&response, "content-type"),
        Some("application/vnd.apple.mpegurl")
    );
    assert_eq!(header_value(&response, "cache-control"), None);
    assert_eq!(
        body_text(response).await,
        format!("#EXTM3U\nhttp://{}/chunk.ts", addr)
    );
}

#[tokio::test]
async fn redirects_are_followed() {
    let app = Router::new()
        .route(
            "/old/seg.ts",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/new/seg.ts")]) }),
        )
        .route("/new/seg.ts", get(|| async { "moved" }));
    let addr = spawn(app).await;

    let response = relay(relay_config())
        .relay(&request(&format!("http://{}/old/seg.ts", addr), None))
        .await
        .unwrap()
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "moved");
}

#[tokio::test]
async fn redirect_chain_is_capped() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/loop.ts",
        get({
            let hits = hits.clone();
            move || async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::FOUND, [(header::LOCATION, "/loop.ts")])
            }
        }),
    );
    let addr = spawn(app).await;

    let relay = relay(relay_config());
    let error = relay
        .relay(&request(&format!("http://{}/loop.ts", addr), None))
        .await
        .err()
        .unwrap();

    // the first request plus five followed hops; a 302 is terminal
    assert_eq!(hits.load(Ordering::SeqCst), 6);
    assert_eq!(error.status(), StatusCode::FOUND);
    assert!(relay.memory().is_empty());
}

#[tokio::test]
async fn subtitles_get_a_vtt_content_type() {
    let app = Router::new().route(
        "/subs/en.vtt",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "application/octet-stream")],
                "WEBVTT\n\n00:00.000 --> 00:01.000\nhi",
            )
        }),
    );
    let addr = spawn(app).await;

    let response = relay(relay_config())
        .relay(&request(&format!("http://{}/subs/en.vtt", addr), None))
        .await
        .unwrap()
        .into_response();
    assert_eq!(
        header_value(&response, "content-type"),
        Some("text/vtt; charset=utf-8")
    );
    assert_eq!(
        header_value(&response, "cache-control"),
        Some("public, max-age=21600, s-maxage=21600, stale-while-revalidate=86400")
    );
}

#[tokio::test]
async fn range_requests_pass_through() {
    let app = Router::new().route(
        "/video.mp4",
        get(|headers: HeaderMap| async move {
            match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
                Some("bytes=0-3") => (
                    StatusCode::PARTIAL_CONTENT,
                    [
                        (header::CONTENT_RANGE, "bytes 0-3/10"),
                        (header::ACCEPT_RANGES, "bytes"),
                    ],
                    "0123",
                )
                    .into_response(),
                _ => "0123456789".into_response(),
            }
        }),
    );
    let addr = spawn(app).await;

    let request = RelayRequest::new(
        Some(&format!("http://{}/video.mp4", addr)),
        None,
        None,
        Some("bytes=0-3"),
    )
    .unwrap();
    let response = relay(relay_config())
        .relay(&request)
        .await
        .unwrap()
        .into_response();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_value(&response, "content-range"), Some("bytes 0-3/10"));
    assert_eq!(header_value(&response, "accept-ranges"), Some("bytes"));
    assert_eq!(body_text(response).await, "0123");
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let app = Router::new().route(
        "/slow.ts",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "late"
        }),
    );
    let addr = spawn(app).await;
    let origin = format!("http://{}/", addr);

    let relay = relay(RelayConfig {
        timeout_ms: 100,
        ..relay_config()
    });
    let error = relay
        .relay(&request(&format!("{}slow.ts", origin), Some(&origin)))
        .await
        .err()
        .unwrap();

    assert_eq!(error.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error.to_string(), "upstream fetch failed (timeout)");
}

#[tokio::test]
async fn unreachable_upstream_is_a_bad_gateway() {
    let addr = closed_addr().await;

    let error = relay(relay_config())
        .relay(&request(&format!("http://{}/seg.ts", addr), None))
        .await
        .err()
        .unwrap();

    assert_eq!(error.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error.to_string(), "upstream fetch failed (network)");
}

async fn spawn_service(relay_config: RelayConfig) -> std::net::SocketAddr {
    let state = AppState::with_parts(
        relay(relay_config),
        SourceResolver::new(ResolverConfig::default()).unwrap(),
    );
    spawn(router(Arc::new(state))).await
}

#[tokio::test]
async fn proxy_route_end_to_end() {
    let upstream = spawn(Router::new().route("/a/seg.ts", get(|| async { "payload" }))).await;
    let service = spawn_service(relay_config()).await;
    let client = reqwest::Client::new();

    let target = format!("http://{}/a/seg.ts", upstream);
    let response = client
        .get(format!(
            "http://{}/proxy?u={}",
            service,
            urlencoding::encode(&target)
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    assert!(response.headers().contains_key("anistream-version"));
    assert_eq!(
        response.headers()["cache-control"],
        "public, max-age=86400, s-maxage=86400, immutable"
    );
    assert_eq!(response.text().await.unwrap(), "payload");

    let response = client
        .get(format!(
            "http://{}/proxy?url=&u={}",
            service,
            urlencoding::encode(&target)
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "payload");

    let response = client
        .get(format!("http://{}/proxy", service))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    let response = client
        .request(reqwest::Method::OPTIONS, format!("http://{}/proxy", service))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["access-control-allow-methods"],
        "GET, HEAD, POST, OPTIONS"
    );
}

#[tokio::test]
async fn version_route_reports_build_info() {
    let service = spawn_service(relay_config()).await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/version", service))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body.get("commit").is_some());
}
