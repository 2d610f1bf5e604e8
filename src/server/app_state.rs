use crate::{common::banner::BuildInfo, configs::Config, relay::Relay, resolver::SourceResolver};

/// Top-level application state.
pub struct AppState {
    pub relay: Relay,
    pub resolver: SourceResolver,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let relay = Relay::new(config.relay.clone())?;
        let resolver = SourceResolver::new(config.resolver.clone())?;
        Ok(Self::with_parts(relay, resolver))
    }

    pub fn with_parts(relay: Relay, resolver: SourceResolver) -> Self {
        Self {
            relay,
            resolver,
            build: BuildInfo::default(),
        }
    }
}
