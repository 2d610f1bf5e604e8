use std::time::Duration;

use reqwest::{Client, Error, redirect::Policy};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct HttpClient;

impl HttpClient {
  pub fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
  }

  /// Client for JSON/HTML calls to the catalogue and mirror sites.
  pub fn new(timeout: Duration) -> Result<Client, Error> {
    Client::builder()
      .user_agent(Self::default_user_agent())
      .timeout(timeout)
      .build()
  }

  /// Client for the relay. Redirects are followed by hand, and bodies are
  /// passed through untouched so upstream lengths and ranges stay valid.
  pub fn new_relay() -> Result<Client, Error> {
    Client::builder()
      .user_agent(Self::default_user_agent())
      .redirect(Policy::none())
      .no_gzip()
      .no_deflate()
      .build()
  }
}
