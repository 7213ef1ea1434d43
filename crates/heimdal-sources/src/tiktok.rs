//! TikTok trending hashtags and video metrics.

use heimdal_core::Secret;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::http::{build_client, decode_items, join, parse_base_url, send_json};
use crate::Fetched;

const DEFAULT_BASE_URL: &str = "https://open-api.tiktok.com/";
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_MAX_PAGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TikTokHashtag {
    pub name: String,
    #[serde(default)]
    pub view_count: Option<i64>,
    #[serde(default)]
    pub video_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TikTokVideo {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub share_count: Option<i64>,
    #[serde(default)]
    pub view_count: Option<i64>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct HashtagData {
    #[serde(default)]
    hashtags: Vec<Value>,
}

#[derive(Deserialize)]
struct VideoData {
    #[serde(default)]
    videos: Vec<Value>,
    #[serde(default)]
    cursor: Option<i64>,
    #[serde(default)]
    has_more: bool,
}

pub struct TikTokClient {
    client: Client,
    api_key: Secret,
    base_url: Url,
    page_size: u32,
    max_pages: usize,
}

impl TikTokClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: Secret, timeout_secs: u64) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: Secret,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            base_url: parse_base_url(base_url)?,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// # Errors
    ///
    /// [`SourceError::Auth`], [`SourceError::Upstream`], [`SourceError::Timeout`]
    /// or [`SourceError::Deserialize`].
    pub async fn fetch_trending_hashtags(&self) -> Result<Fetched<TikTokHashtag>, SourceError> {
        let url = join(&self.base_url, "api/v2/hashtag/trending")?;
        let request = self.client.get(url.clone()).bearer_auth(self.api_key.expose());
        let envelope: Envelope<HashtagData> =
            send_json(request, &url, "hashtag/trending").await?;

        Ok(envelope
            .data
            .map(|d| decode_items(d.hashtags))
            .unwrap_or_default())
    }

    /// Fetches recent videos, following `cursor` while `has_more` is set.
    ///
    /// Stops at `max_pages` or when the cursor does not advance. An error on a
    /// later page returns the videos gathered so far.
    ///
    /// # Errors
    ///
    /// Returns the first page's error.
    pub async fn fetch_videos(&self) -> Result<Fetched<TikTokVideo>, SourceError> {
        let mut fetched = Fetched::default();
        let mut cursor: i64 = 0;

        for page_number in 1..=self.max_pages {
            let data = match self.fetch_video_page(cursor).await {
                Ok(data) => data,
                Err(e) if page_number > 1 => {
                    tracing::warn!(
                        page_number,
                        cursor,
                        error = %e,
                        "tiktok: pagination failed mid-sequence, keeping earlier pages"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };
            let Some(data) = data else { break };
            fetched.absorb(decode_items(data.videos));

            match data.cursor {
                Some(next) if data.has_more && next > cursor => cursor = next,
                _ => break,
            }
        }

        Ok(fetched)
    }

    async fn fetch_video_page(&self, cursor: i64) -> Result<Option<VideoData>, SourceError> {
        let mut url = join(&self.base_url, "api/v2/video/list")?;
        url.query_pairs_mut()
            .append_pair("count", &self.page_size.to_string())
            .append_pair("cursor", &cursor.to_string());
        let request = self.client.get(url.clone()).bearer_auth(self.api_key.expose());
        let envelope: Envelope<VideoData> =
            send_json(request, &url, &format!("video/list(cursor={cursor})")).await?;
        Ok(envelope.data)
    }
}
