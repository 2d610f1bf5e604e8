use std::collections::HashSet;

use reqwest::Url;

/// One referer/origin combination tried against an upstream host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptStrategy {
    pub referer: Option<String>,
    pub include_origin: bool,
}

impl AttemptStrategy {
    pub fn new(referer: Option<String>, include_origin: bool) -> Self {
        Self {
            referer,
            include_origin,
        }
    }

    /// Stable key used to remember this strategy per host.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}",
            self.referer.as_deref().unwrap_or("none"),
            if self.include_origin {
                "origin"
            } else {
                "no-origin"
            }
        )
    }

    /// `Origin` header value derived from the referer, if one should be sent.
    pub fn origin(&self) -> Option<String> {
        if !self.include_origin {
            return None;
        }
        let referer = Url::parse(self.referer.as_deref()?).ok()?;
        let origin = referer.origin();
        origin.is_tuple().then(|| origin.ascii_serialization())
    }
}

/// `scheme://host[:port]/` of a URL, or the raw value when it does not parse.
pub fn normalize_referer(referer: &str) -> String {
    match Url::parse(referer) {
        Ok(url) if url.origin().is_tuple() => format!("{}/", url.origin().ascii_serialization()),
        _ => referer.to_string(),
    }
}

/// Builds the deduplicated attempt list for one relay call.
///
/// Order: explicit referer with and without `Origin`, the target's own origin
/// with and without `Origin`, each known referer with and without `Origin`,
/// then a bare request with no referer at all.
pub fn build_attempts(
    explicit_referer: &str,
    target: &Url,
    known_referers: &[String],
) -> Vec<AttemptStrategy> {
    let mut referers = vec![Some(normalize_referer(explicit_referer))];

    let target_origin = target.origin();
    if target_origin.is_tuple() {
        referers.push(Some(format!("{}/", target_origin.ascii_serialization())));
    }
    referers.extend(known_referers.iter().cloned().map(Some));

    let mut attempts: Vec<AttemptStrategy> = referers
        .into_iter()
        .flat_map(|referer| {
            [
                AttemptStrategy::new(referer.clone(), true),
                AttemptStrategy::new(referer, false),
            ]
        })
        .collect();
    attempts.push(AttemptStrategy::new(None, false));

    let mut seen = HashSet::new();
    attempts.retain(|attempt| seen.insert(attempt.signature()));
    attempts
}

/// Moves attempts matching `preferred` to the front, keeping relative order.
pub fn prioritize(attempts: Vec<AttemptStrategy>, preferred: Option<&str>) -> Vec<AttemptStrategy> {
    let Some(preferred) = preferred else {
        return attempts;
    };

    let (mut front, back): (Vec<_>, Vec<_>) = attempts
        .into_iter()
        .partition(|attempt| attempt.signature() == preferred);
    front.extend(back);
    front
}
