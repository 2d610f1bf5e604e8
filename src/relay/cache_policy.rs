use serde::{Deserialize, Serialize};

use super::manifest::is_manifest_content_type;

/// How aggressively edge caches may keep relayed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CacheMode {
    /// Forward the upstream `Cache-Control` untouched.
    Off,
    Conservative,
    #[default]
    Bandwidth,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Conservative => "conservative",
            Self::Bandwidth => "bandwidth",
        }
    }
}

/// Unknown values fall back to `bandwidth`.
impl From<String> for CacheMode {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Self::Off,
            "conservative" => Self::Conservative,
            _ => Self::Bandwidth,
        }
    }
}

impl From<CacheMode> for String {
    fn from(mode: CacheMode) -> Self {
        mode.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Manifest,
    Segment,
    Captions,
    Image,
    Other,
}

const SEGMENT_SUFFIXES: &[&str] = &[".ts", ".m4s", ".mp4"];
const IMAGE_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif", ".avif"];

impl ResourceClass {
    /// Classifies by URL path suffix first, then by content type.
    pub fn classify(path: &str, content_type: &str) -> Self {
        let path = path.to_ascii_lowercase();
        let content_type = content_type.to_ascii_lowercase();

        if path.ends_with(".m3u8") || is_manifest_content_type(&content_type) {
            Self::Manifest
        } else if SEGMENT_SUFFIXES.iter().any(|s| path.ends_with(s))
            || content_type.starts_with("video/")
        {
            Self::Segment
        } else if path.ends_with(".vtt") || content_type.contains("text/vtt") {
            Self::Captions
        } else if IMAGE_SUFFIXES.iter().any(|s| path.ends_with(s))
            || content_type.starts_with("image/")
        {
            Self::Image
        } else {
            Self::Other
        }
    }
}

/// Picks the `Cache-Control` value to send downstream, or `None` to omit it.
pub fn resolve_cache_control(
    mode: CacheMode,
    class: ResourceClass,
    upstream: Option<&str>,
) -> Option<String> {
    let upstream = upstream.filter(|v| !v.is_empty());

    let value = match (mode, class) {
        (CacheMode::Off, _) => return upstream.map(str::to_string),

        (CacheMode::Conservative, ResourceClass::Manifest) => {
            "public, max-age=4, s-maxage=4, stale-while-revalidate=12"
        }
        (CacheMode::Conservative, ResourceClass::Segment) => "public, max-age=3600, s-maxage=3600",
        (CacheMode::Conservative, ResourceClass::Captions | ResourceClass::Image) => {
            "public, max-age=1800, s-maxage=1800, stale-while-revalidate=21600"
        }
        (CacheMode::Conservative, ResourceClass::Other) => {
            upstream.unwrap_or("public, max-age=60, s-maxage=60")
        }

        (CacheMode::Bandwidth, ResourceClass::Manifest) => {
            "public, max-age=6, s-maxage=6, stale-while-revalidate=15"
        }
        (CacheMode::Bandwidth, ResourceClass::Segment) => {
            "public, max-age=86400, s-maxage=86400, immutable"
        }
        (CacheMode::Bandwidth, ResourceClass::Captions | ResourceClass::Image) => {
            "public, max-age=21600, s-maxage=21600, stale-while-revalidate=86400"
        }
        (CacheMode::Bandwidth, ResourceClass::Other) => {
            upstream.unwrap_or("public, max-age=120, s-maxage=120")
        }
    };

    Some(value.to_string())
}
