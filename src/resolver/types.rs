use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The server entry the player picked from the episode's server list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedServer {
    pub id: String,
    /// `sub`, `dub` or `raw`.
    #[serde(rename = "type")]
    pub server_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRequest {
    pub selected_server: SelectedServer,
    /// Raw episode id as used by the catalogue, e.g. `one-piece-100?ep=2142`.
    pub id: String,
}

impl SourceRequest {
    pub fn new(selected_server: SelectedServer, id: impl Into<String>) -> Self {
        Self {
            selected_server,
            id: id.into(),
        }
    }

    /// Everything after the last `ep=` marker, or the whole id without one.
    pub fn episode_id(&self) -> &str {
        self.id.rsplit("ep=").next().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamLink {
    pub file: String,
    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    pub id: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub link: StreamLink,
    pub tracks: Vec<Value>,
    pub intro: Option<Value>,
    pub outro: Option<Value>,
    pub server: String,
    pub used_fallback: bool,
}

/// Sources plus the raw response they came from, before validation.
#[derive(Debug, Clone)]
pub(crate) struct RawSources {
    pub sources: Vec<Value>,
    pub raw: Value,
}

impl RawSources {
    /// `file` of the first source, when it is a non-empty string.
    pub fn first_file(&self) -> Option<&str> {
        self.sources
            .first()
            .and_then(|s| s.get("file"))
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
    }
}
