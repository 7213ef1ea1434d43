//! Twitter/X trends via the v1.1 `trends/place` endpoint.

use heimdal_core::Secret;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::http::{build_client, decode_items, join, parse_base_url, send_json};
use crate::Fetched;

const DEFAULT_BASE_URL: &str = "https://api.twitter.com/";

/// One entry of the `trends` array. Hashtag trends have a `name` starting with `#`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TwitterTrend {
    pub name: String,
    /// Tweets in the last 24 hours; `null` when Twitter has no figure.
    #[serde(default)]
    pub tweet_volume: Option<i64>,
}

#[derive(Deserialize)]
struct PlaceTrends {
    #[serde(default)]
    trends: Vec<Value>,
}

/// App-only (OAuth 2 bearer) client for the trends endpoint.
pub struct TwitterClient {
    client: Client,
    bearer_token: Secret,
    base_url: Url,
}

impl TwitterClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(bearer_token: Secret, timeout_secs: u64) -> Result<Self, SourceError> {
        Self::with_base_url(bearer_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        bearer_token: Secret,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            bearer_token,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Fetches the current trends for a Yahoo WOEID (`1` is worldwide).
    ///
    /// # Errors
    ///
    /// - [`SourceError::Auth`] if the bearer token is rejected.
    /// - [`SourceError::Upstream`] for any other non-2xx status.
    /// - [`SourceError::Timeout`] if the request timeout elapses.
    /// - [`SourceError::Deserialize`] if the envelope is not the expected array.
    pub async fn fetch_place_trends(&self, woeid: u32) -> Result<Fetched<TwitterTrend>, SourceError> {
        let mut url = join(&self.base_url, "1.1/trends/place.json")?;
        url.query_pairs_mut().append_pair("id", &woeid.to_string());

        let request = self
            .client
            .get(url.clone())
            .bearer_auth(self.bearer_token.expose());
        let places: Vec<PlaceTrends> =
            send_json(request, &url, &format!("trends/place(id={woeid})")).await?;

        let values = places.into_iter().flat_map(|p| p.trends).collect();
        Ok(decode_items(values))
    }
}
