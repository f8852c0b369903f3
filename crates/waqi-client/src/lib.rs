//! Async client for the WAQI (World Air Quality Index) feed API.
//!
//! Fetches per-station feeds from `https://api.waqi.info/feed/{station}/`
//! and normalizes them into [`StationFeed`] records. The upstream API is
//! lenient about missing sensors: individual readings may be absent, `null`,
//! or literal placeholder strings such as `"-"`, all of which normalize
//! to 0.0 here.

pub mod feed;

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

pub use feed::StationFeed;

/// Result type alias using WaqiError.
pub type WaqiResult<T> = Result<T, WaqiError>;

/// Errors from the WAQI feed API.
#[derive(Debug, Error)]
pub enum WaqiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed returned HTTP {0}")]
    BadStatus(u16),

    #[error("Feed status was '{0}' (expected 'ok')")]
    FeedNotOk(String),

    #[error("Malformed feed payload: {0}")]
    Malformed(String),
}

const API_BASE: &str = "https://api.waqi.info";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for WAQI station feeds.
#[derive(Debug, Clone)]
pub struct WaqiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl WaqiClient {
    /// Build a client with the given API token ("demo" works with limits).
    pub fn new(token: impl Into<String>) -> WaqiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            token: token.into(),
        })
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch and normalize one station feed.
    ///
    /// `station` is a WAQI slug such as `delhi/anand-vihar`.
    pub async fn fetch_station(&self, station: &str) -> WaqiResult<StationFeed> {
        let url = format!(
            "{}/feed/{}/?token={}",
            self.base_url, station, self.token
        );
        debug!(station = %station, "Fetching WAQI feed");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(WaqiError::BadStatus(response.status().as_u16()));
        }

        let body: serde_json::Value = response.json().await?;
        feed::parse_feed(station, &body)
    }
}
