use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, header};
use reqwest::{Client, Response, Url};
use tracing::debug;

/// Statuses that send the attempt around again. `204` is included on purpose:
/// some CDNs answer blocked segment requests with an empty 204.
pub fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        204 | 403 | 429 | 500 | 502 | 503 | 504 | 520..=526
    )
}

#[derive(Debug)]
pub enum FetchFailure {
    Timeout,
    Network(reqwest::Error),
}

/// Sends one attempt: manual redirects, bounded hops, per-hop deadline.
pub struct Fetcher<'a> {
    pub client: &'a Client,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub retry_count: u32,
}

impl Fetcher<'_> {
    async fn fetch_once(&self, url: &Url, headers: &HeaderMap) -> Result<Response, FetchFailure> {
        let request = self.client.get(url.clone()).headers(headers.clone()).send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(FetchFailure::Timeout),
            Ok(Err(e)) => Err(FetchFailure::Network(e)),
            Err(_) => Err(FetchFailure::Timeout),
        }
    }

    pub async fn follow_redirects(
        &self,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<Response, FetchFailure> {
        let mut current = url.clone();
        let mut hops = 0;

        loop {
            let response = self.fetch_once(&current, headers).await?;
            if !response.status().is_redirection() || hops >= self.max_redirects {
                return Ok(response);
            }

            let next = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| current.join(location).ok());

            match next {
                Some(next) => {
                    debug!("Relay redirect {} -> {}", current, next);
                    current = next;
                    hops += 1;
                }
                None => return Ok(response),
            }
        }
    }

    /// Repeats the attempt while the status is retryable, up to `retry_count`
    /// extra times. A response from an earlier try wins over a later failure.
    pub async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Response, FetchFailure> {
        let mut outcome = self.follow_redirects(url, headers).await;

        for _ in 0..self.retry_count {
            if matches!(&outcome, Ok(r) if !is_retryable(r.status())) {
                break;
            }
            let retry = self.follow_redirects(url, headers).await;
            outcome = match (outcome, retry) {
                (Ok(previous), Err(_)) => Ok(previous),
                (_, retry) => retry,
            };
        }

        outcome
    }
}
