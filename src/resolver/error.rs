use thiserror::Error;

/// Why a single resolution attempt failed. Never leaves the resolver; it is
/// logged and the attempt is retried.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },
    #[error("ajax sources response has no link")]
    MissingLink,
    #[error("invalid ajax link format: {0}")]
    InvalidLink(String),
    #[error("token extraction failed")]
    TokenMissing,
    #[error("getSources response has no sources payload")]
    SourcesMissing,
    #[error("unsupported sources format")]
    UnsupportedSources,
    #[error("no decryption key available: {0}")]
    KeyUnavailable(String),
    #[error("AES decryption failed")]
    DecryptionFailed,
    #[error("all fallback providers failed")]
    FallbackExhausted,
    #[error("resolved sources have no playable file")]
    InvalidSources,
}

impl ResolveError {
    pub(crate) fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }
}
