//! Facebook Graph API page posts with `paging.next` cursor pagination.

use std::collections::HashSet;

use heimdal_core::Secret;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::http::{build_client, decode_items, join, parse_base_url, send_json};
use crate::Fetched;

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/";
const GRAPH_VERSION: &str = "v19.0";
const POST_FIELDS: &str =
    "id,message,created_time,status_type,shares,likes.summary(true),comments.summary(true)";
const DEFAULT_PAGE_SIZE: u32 = 25;
const DEFAULT_MAX_PAGES: usize = 4;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FacebookPost {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub status_type: Option<String>,
    #[serde(default)]
    pub shares: Option<ShareCount>,
    #[serde(default)]
    pub likes: Option<SummaryEdge>,
    #[serde(default)]
    pub comments: Option<SummaryEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ShareCount {
    pub count: i64,
}

/// An edge requested with `.summary(true)`; only the summary is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SummaryEdge {
    #[serde(default)]
    pub summary: Option<EdgeSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EdgeSummary {
    pub total_count: i64,
}

impl FacebookPost {
    #[must_use]
    pub fn like_count(&self) -> Option<i64> {
        self.likes.and_then(|e| e.summary).map(|s| s.total_count)
    }

    #[must_use]
    pub fn comment_count(&self) -> Option<i64> {
        self.comments.and_then(|e| e.summary).map(|s| s.total_count)
    }

    #[must_use]
    pub fn share_count(&self) -> Option<i64> {
        self.shares.map(|s| s.count)
    }
}

#[derive(Deserialize)]
struct PostsPage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

pub struct FacebookClient {
    client: Client,
    access_token: Secret,
    base_url: Url,
    page_size: u32,
    max_pages: usize,
}

impl FacebookClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(access_token: Secret, timeout_secs: u64) -> Result<Self, SourceError> {
        Self::with_base_url(access_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        access_token: Secret,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            access_token,
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

    /// Fetches recent posts for a page, following `paging.next` links.
    ///
    /// Pagination stops at `max_pages`, when a `next` link repeats, or when it
    /// points at a different origin than the base URL. An error on any page
    /// after the first ends the sequence and returns the posts gathered so far.
    ///
    /// # Errors
    ///
    /// Returns the first page's error: [`SourceError::Auth`] for a rejected
    /// token, [`SourceError::Upstream`], [`SourceError::Timeout`], or
    /// [`SourceError::Deserialize`].
    pub async fn fetch_page_posts(&self, page_id: &str) -> Result<Fetched<FacebookPost>, SourceError> {
        let mut url = join(&self.base_url, &format!("{GRAPH_VERSION}/{page_id}/posts"))?;
        url.query_pairs_mut()
            .append_pair("fields", POST_FIELDS)
            .append_pair("limit", &self.page_size.to_string());

        let mut fetched = Fetched::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut next = Some(url);
        let mut page_number = 0usize;

        while let Some(page_url) = next.take() {
            page_number += 1;
            seen.insert(page_url.to_string());

            let page = match self.fetch_page(&page_url, page_id).await {
                Ok(page) => page,
                Err(e) if page_number > 1 => {
                    tracing::warn!(
                        page_id,
                        page_number,
                        error = %e,
                        "facebook: pagination failed mid-sequence, keeping earlier pages"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };
            fetched.absorb(decode_items(page.data));

            if page_number >= self.max_pages {
                break;
            }
            next = page
                .paging
                .and_then(|p| p.next)
                .and_then(|raw| Url::parse(&raw).ok())
                .filter(|u| u.origin() == self.base_url.origin())
                .filter(|u| !seen.contains(u.as_str()));
        }

        Ok(fetched)
    }

    async fn fetch_page(&self, url: &Url, page_id: &str) -> Result<PostsPage, SourceError> {
        // `paging.next` already carries the token; set it once so it is not duplicated.
        let mut request_url = url.clone();
        if !request_url.query_pairs().any(|(k, _)| k == "access_token") {
            request_url
                .query_pairs_mut()
                .append_pair("access_token", self.access_token.expose());
        }
        let request = self.client.get(request_url.clone());
        send_json(request, &request_url, &format!("{page_id}/posts")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_are_optional() {
        let post: FacebookPost = serde_json::from_value(serde_json::json!({
            "id": "1_2",
            "likes": {"data": [], "summary": {"total_count": 7}},
            "comments": {"data": []}
        }))
        .unwrap();
        assert_eq!(post.like_count(), Some(7));
        assert_eq!(post.comment_count(), None);
        assert_eq!(post.share_count(), None);
    }
}
