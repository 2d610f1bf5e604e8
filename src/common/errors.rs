use serde::Serialize;

/// JSON error body returned by the API routes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub success: bool,
    /// Human-readable error message.
    pub message: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: crate::common::types::now_ms(),
        }
    }
}
