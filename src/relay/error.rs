use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::{fetch::is_retryable, headers::cors_headers};
use crate::common::errors::ApiError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid \"url\" query parameter (or use \"u\")")]
    InvalidInput,
    #[error("upstream fetch failed (timeout)")]
    UpstreamTimeout,
    #[error("upstream fetch failed (network)")]
    UpstreamUnreachable(String),
    #[error("upstream fetch failed ({})", rejected_reason(.status))]
    UpstreamRejected { status: StatusCode },
}

fn rejected_reason(status: &StatusCode) -> String {
    if *status == StatusCode::NO_CONTENT {
        "204 empty response".to_string()
    } else {
        status.as_u16().to_string()
    }
}

impl RelayError {
    /// Status sent to the client. Retryable upstream statuses that survive
    /// every attempt become a gateway error; terminal ones are mirrored.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamRejected { status } if is_retryable(*status) => StatusCode::BAD_GATEWAY,
            Self::UpstreamRejected { status } => *status,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::InvalidInput => {
                (status, cors_headers(), Json(ApiError::new(self.to_string()))).into_response()
            }
            _ => (status, cors_headers(), self.to_string()).into_response(),
        }
    }
}
