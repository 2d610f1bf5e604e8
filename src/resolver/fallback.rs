use regex::Regex;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{error::ResolveError, types::RawSources};
use crate::common::http::HttpClient;

/// An alternate mirror that serves the same episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackProvider {
    pub name: String,
    /// Bare host (`megaplay.buzz`, served over https) or a full origin.
    pub domain: String,
}

impl FallbackProvider {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }

    pub fn origin(&self) -> String {
        if self.domain.contains("://") {
            self.domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.domain)
        }
    }
}

/// `hd-1` streams are mirrored by the first provider, everything else by the
/// second; the matching provider goes first, the rest keep their order.
pub fn prioritize_providers(providers: &[FallbackProvider], server_name: &str) -> Vec<FallbackProvider> {
    let primary_index = if server_name.eq_ignore_ascii_case("hd-1") { 0 } else { 1 };

    let mut ordered = Vec::with_capacity(providers.len());
    if let Some(primary) = providers.get(primary_index) {
        ordered.push(primary.clone());
    }
    ordered.extend(
        providers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != primary_index)
            .map(|(_, p)| p.clone()),
    );
    ordered
}

pub struct FallbackChain {
    client: reqwest::Client,
    providers: Vec<FallbackProvider>,
    data_id_regex: Regex,
}

impl FallbackChain {
    pub fn new(client: reqwest::Client, providers: Vec<FallbackProvider>) -> Self {
        Self {
            client,
            providers,
            data_id_regex: Regex::new(r#"data-id=["'](\d+)["']"#).unwrap(),
        }
    }

    pub fn extract_data_id(&self, html: &str) -> Option<String> {
        self.data_id_regex
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Tries each provider in priority order and stops at the first one that
    /// yields a stream file.
    pub(crate) async fn resolve(
        &self,
        episode_id: &str,
        server_type: &str,
        server_name: &str,
    ) -> Result<RawSources, ResolveError> {
        for provider in prioritize_providers(&self.providers, server_name) {
            match self.try_provider(&provider, episode_id, server_type).await {
                Ok(Some(sources)) => {
                    debug!("Fallback provider {} resolved episode {}", provider.name, episode_id);
                    return Ok(sources);
                }
                Ok(None) => {
                    debug!("Fallback provider {} has no stream for {}", provider.name, episode_id);
                }
                Err(e) => {
                    warn!("Fallback provider {} failed: {}", provider.name, e);
                }
            }
        }

        Err(ResolveError::FallbackExhausted)
    }

    async fn try_provider(
        &self,
        provider: &FallbackProvider,
        episode_id: &str,
        server_type: &str,
    ) -> Result<Option<RawSources>, ResolveError> {
        let origin = provider.origin();
        let referer = format!("{}/", origin);

        let page_url = format!("{}/stream/s-2/{}/{}", origin, episode_id, server_type);
        let html = self
            .get(&page_url, &referer, false)
            .await?
            .text()
            .await
            .map_err(|e| ResolveError::http(&page_url, e))?;

        let Some(data_id) = self.extract_data_id(&html) else {
            return Ok(None);
        };

        let sources_url = format!("{}/stream/getSources?id={}", origin, data_id);
        let data: Value = self
            .get(&sources_url, &referer, true)
            .await?
            .json()
            .await
            .map_err(|e| ResolveError::http(&sources_url, e))?;

        let file = data
            .get("sources")
            .and_then(|s| s.get("file"))
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        Ok(file.map(|file| RawSources {
            sources: vec![json!({ "file": file })],
            raw: data,
        }))
    }

    async fn get(
        &self,
        url: &str,
        referer: &str,
        xhr: bool,
    ) -> Result<reqwest::Response, ResolveError> {
        let mut request = self
            .client
            .get(url)
            .header(header::REFERER, referer)
            .header(header::USER_AGENT, HttpClient::default_user_agent());
        if xhr {
            request = request.header("X-Requested-With", "XMLHttpRequest");
        }

        let response = request.send().await.map_err(|e| ResolveError::http(url, e))?;
        if !response.status().is_success() {
            return Err(ResolveError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> Vec<FallbackProvider> {
        vec![
            FallbackProvider::new("megaplay", "megaplay.buzz"),
            FallbackProvider::new("vidwish", "vidwish.live"),
        ]
    }

    fn names(providers: &[FallbackProvider]) -> Vec<&str> {
        providers.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn hd1_prefers_first_provider() {
        assert_eq!(names(&prioritize_providers(&providers(), "HD-1")), ["megaplay", "vidwish"]);
        assert_eq!(names(&prioritize_providers(&providers(), "hd-1")), ["megaplay", "vidwish"]);
    }

    #[test]
    fn other_servers_prefer_second_provider() {
        assert_eq!(names(&prioritize_providers(&providers(), "HD-2")), ["vidwish", "megaplay"]);
        assert_eq!(names(&prioritize_providers(&providers(), "")), ["vidwish", "megaplay"]);
    }

    #[test]
    fn single_provider_is_kept() {
        let only = vec![FallbackProvider::new("megaplay", "megaplay.buzz")];
        assert_eq!(names(&prioritize_providers(&only, "HD-2")), ["megaplay"]);
    }

    #[test]
    fn origin_accepts_bare_hosts_and_full_origins() {
        assert_eq!(
            FallbackProvider::new("a", "megaplay.buzz").origin(),
            "https://megaplay.buzz"
        );
        assert_eq!(
            FallbackProvider::new("b", "http://127.0.0.1:9000/").origin(),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn data_id_extraction() {
        let chain = FallbackChain::new(reqwest::Client::new(), providers());
        assert_eq!(
            chain.extract_data_id(r#"<div id="megaplay-player" data-id='118523' data-ep="1">"#).as_deref(),
            Some("118523")
        );
        assert_eq!(chain.extract_data_id(r#"<div data-id="abc">"#), None);
    }
}
