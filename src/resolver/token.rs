use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde_json::Value;
use tracing::{debug, warn};

/// Turns a player page URL into the `_k` access token expected by
/// `getSources`. `None` means no token could be found.
#[async_trait]
pub trait TokenExtractor: Send + Sync {
    async fn extract(&self, player_url: &str) -> Option<String>;
}

/// Asks an external extraction service, or scrapes the player page itself
/// when no service is configured.
pub struct PlayerTokenExtractor {
    client: reqwest::Client,
    service_url: Option<String>,
    referer: String,
    meta_regex: Regex,
    comment_regex: Regex,
    split_regex: Regex,
    attr_regex: Regex,
    script_regex: Regex,
    nonce_regex: Regex,
}

impl PlayerTokenExtractor {
    pub fn new(client: reqwest::Client, service_url: Option<String>, referer: String) -> Self {
        Self {
            client,
            service_url,
            referer,
            meta_regex: Regex::new(r#"<meta\s+name="_gg_fb"\s+content="([A-Za-z0-9]+)""#).unwrap(),
            comment_regex: Regex::new(r"<!--\s*_is_th:([A-Za-z0-9]+)\s*-->").unwrap(),
            split_regex: Regex::new(
                r#"window\._lk_db\s*=\s*\{\s*x:\s*"([A-Za-z0-9]+)",\s*y:\s*"([A-Za-z0-9]+)",\s*z:\s*"([A-Za-z0-9]+)"\s*\}"#,
            )
            .unwrap(),
            attr_regex: Regex::new(r#"data-dpi="([A-Za-z0-9]+)""#).unwrap(),
            script_regex: Regex::new(r#"window\._xy_ws\s*=\s*["']([A-Za-z0-9]+)["']"#).unwrap(),
            nonce_regex: Regex::new(r#"nonce="([A-Za-z0-9]{48})""#).unwrap(),
        }
    }

    /// Looks for the token in the places the player page is known to hide it.
    pub fn find_token(&self, html: &str) -> Option<String> {
        let single = [
            &self.meta_regex,
            &self.comment_regex,
            &self.attr_regex,
            &self.script_regex,
            &self.nonce_regex,
        ];
        for regex in single {
            if let Some(token) = regex.captures(html).and_then(|c| c.get(1)) {
                return Some(token.as_str().to_string());
            }
        }

        self.split_regex.captures(html).map(|caps| {
            (1..=3)
                .filter_map(|i| caps.get(i).map(|m| m.as_str()))
                .collect::<String>()
        })
    }

    async fn from_service(&self, service_url: &str, player_url: &str) -> Option<String> {
        let url = format!("{}?url={}", service_url, urlencoding::encode(player_url));
        let response = match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Token service answered {}", r.status());
                return None;
            }
            Err(e) => {
                warn!("Token service request failed: {}", e);
                return None;
            }
        };

        let body = response.text().await.ok()?;
        let token = match serde_json::from_str::<Value>(&body) {
            Ok(json) => json.get("token").and_then(Value::as_str).map(str::to_string),
            Err(_) => Some(body.trim().to_string()),
        };
        token.filter(|t| !t.is_empty())
    }

    async fn from_player_page(&self, player_url: &str) -> Option<String> {
        let response = self
            .client
            .get(player_url)
            .header(header::REFERER, &self.referer)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!("Player page {} answered {}", player_url, response.status());
            return None;
        }
        let html = response.text().await.ok()?;
        self.find_token(&html)
    }
}

#[async_trait]
impl TokenExtractor for PlayerTokenExtractor {
    async fn extract(&self, player_url: &str) -> Option<String> {
        match &self.service_url {
            Some(service_url) => self.from_service(service_url, player_url).await,
            None => self.from_player_page(player_url).await,
        }
    }
}
