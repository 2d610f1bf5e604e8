use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::server::AppState;

pub async fn get_version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("GET /version");
    Json(state.build.clone())
}
