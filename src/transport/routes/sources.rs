use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    common::errors::ApiError,
    resolver::{SelectedServer, SourceRequest},
    server::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesQuery {
    /// Episode id as it appears in the catalogue, e.g. `show-123?ep=4567`.
    pub id: Option<String>,
    pub server_id: Option<String>,
    pub server: Option<String>,
    #[serde(rename = "type")]
    pub server_type: Option<String>,
}

pub async fn get_sources(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SourcesQuery>,
) -> impl IntoResponse {
    tracing::info!(
        "GET /sources id={:?} serverId={:?} server={:?} type={:?}",
        params.id,
        params.server_id,
        params.server,
        params.server_type
    );

    let (Some(id), Some(server_id)) = (
        params.id.filter(|v| !v.is_empty()),
        params.server_id.filter(|v| !v.is_empty()),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("\"id\" and \"serverId\" are required")),
        )
            .into_response();
    };

    let request = SourceRequest::new(
        SelectedServer {
            id: server_id,
            server_type: params.server_type.unwrap_or_else(|| "sub".to_string()),
            name: params.server.unwrap_or_else(|| "HD-1".to_string()),
        },
        id,
    );

    match state.resolver.resolve(&request).await {
        Some(resolved) => (StatusCode::OK, Json(resolved)).into_response(),
        None => {
            tracing::warn!("GET /sources: nothing resolved for {}", request.id);
            (
                StatusCode::NOT_FOUND,
                Json(ApiError::new(format!("No playable source for {}", request.id))),
            )
                .into_response()
        }
    }
}
