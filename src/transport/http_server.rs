use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::{
    server::AppState,
    transport::{
        middleware::add_response_headers,
        routes::{proxy, sources, version},
    },
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/proxy",
            get(proxy::proxy_stream).options(proxy::proxy_options),
        )
        .route("/sources", get(sources::get_sources))
        .route("/version", get(version::get_version))
        .layer(middleware::from_fn(add_response_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
