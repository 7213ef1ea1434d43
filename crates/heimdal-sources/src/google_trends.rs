//! Google Trends search interest.
//!
//! Google Trends has no public API. The web frontend first calls `explore`,
//! which returns one widget per chart together with a short-lived token, then
//! calls `widgetdata/*` with each widget's `request` object and token. Every
//! response body starts with an anti-JSON-hijacking prefix such as `)]}'`
//! that must be stripped before parsing.

use std::collections::HashMap;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::http::{build_client, join, parse_base_url, parse_json, send_text};

const DEFAULT_BASE_URL: &str = "https://trends.google.com/";
const HOST_LANGUAGE: &str = "en-US";
const TZ_OFFSET_MINUTES: &str = "360";
const TIMEFRAME: &str = "now 7-d";
/// The explore endpoint compares at most five keywords per request.
const MAX_KEYWORDS_PER_REQUEST: usize = 5;

/// Latest interest figures for one keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordInterest {
    pub keyword: String,
    /// Latest point of the interest-over-time series, 0 to 100.
    pub trend_score: f64,
    /// Sum of the "top" related-query values, a rough volume proxy.
    pub related_volume: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    token: String,
    request: Value,
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: MultilineDefault,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultilineDefault {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelinePoint {
    #[serde(default)]
    value: Vec<f64>,
    #[serde(default)]
    has_data: Vec<bool>,
}

#[derive(Debug, Deserialize)]
struct RelatedResponse {
    default: RelatedDefault,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedDefault {
    #[serde(default)]
    ranked_list: Vec<RankedList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankedList {
    #[serde(default)]
    ranked_keyword: Vec<RankedKeyword>,
}

#[derive(Debug, Deserialize)]
struct RankedKeyword {
    #[serde(default)]
    value: i64,
}

pub struct GoogleTrendsClient {
    client: Client,
    base_url: Url,
}

impl GoogleTrendsClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(timeout_secs: u64) -> Result<Self, SourceError> {
        Self::with_base_url(timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(timeout_secs: u64, base_url: &str) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Fetches the latest 7-day interest score for each keyword in `geo`.
    ///
    /// Keywords are queried in groups of five. Keywords with no data in the
    /// series are left out of the result. A failed related-queries lookup
    /// leaves `related_volume` empty instead of failing the keyword.
    ///
    /// # Errors
    ///
    /// Returns the first group's `explore` or `multiline` error, or
    /// [`SourceError::Protocol`] if its `explore` returns no time-series
    /// widget. A later group's failure is logged and ends the lookup with
    /// the scores gathered so far.
    pub async fn fetch_interest(
        &self,
        keywords: &[String],
        geo: &str,
    ) -> Result<Vec<KeywordInterest>, SourceError> {
        let mut results = Vec::with_capacity(keywords.len());
        for (index, group) in keywords.chunks(MAX_KEYWORDS_PER_REQUEST).enumerate() {
            match self.fetch_group(group, geo).await {
                Ok(scores) => results.extend(scores),
                Err(e) if index == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        group = index,
                        kept = results.len(),
                        error = %e,
                        "google_trends: keyword group failed; keeping earlier groups"
                    );
                    break;
                }
            }
        }
        Ok(results)
    }

    async fn fetch_group(
        &self,
        keywords: &[String],
        geo: &str,
    ) -> Result<Vec<KeywordInterest>, SourceError> {
        let widgets = self.explore(keywords, geo).await?;

        let timeseries = widgets
            .iter()
            .find(|w| w.id == "TIMESERIES")
            .ok_or_else(|| SourceError::Protocol {
                context: "explore".to_string(),
                reason: "no TIMESERIES widget in response".to_string(),
            })?;
        let scores = self.latest_scores(timeseries, keywords.len()).await?;

        let mut volumes: HashMap<usize, i64> = HashMap::new();
        for (index, widget) in widgets
            .iter()
            .filter_map(|w| related_index(&w.id).map(|i| (i, w)))
        {
            match self.related_volume(widget).await {
                Ok(volume) => {
                    volumes.insert(index, volume);
                }
                Err(e) => tracing::warn!(
                    keyword = keywords.get(index).map_or("?", String::as_str),
                    error = %e,
                    "google_trends: related queries unavailable"
                ),
            }
        }

        Ok(keywords
            .iter()
            .enumerate()
            .filter_map(|(i, keyword)| {
                scores[i].map(|trend_score| KeywordInterest {
                    keyword: keyword.clone(),
                    trend_score,
                    related_volume: volumes.get(&i).copied(),
                })
            })
            .collect())
    }

    async fn explore(&self, keywords: &[String], geo: &str) -> Result<Vec<Widget>, SourceError> {
        let comparison: Vec<Value> = keywords
            .iter()
            .map(|k| serde_json::json!({"keyword": k, "geo": geo, "time": TIMEFRAME}))
            .collect();
        let req = serde_json::json!({
            "comparisonItem": comparison,
            "category": 0,
            "property": "",
        });

        let mut url = join(&self.base_url, "trends/api/explore")?;
        url.query_pairs_mut()
            .append_pair("hl", HOST_LANGUAGE)
            .append_pair("tz", TZ_OFFSET_MINUTES)
            .append_pair("req", &req.to_string());

        let body = send_text(self.client.get(url.clone()), &url).await?;
        let explore: ExploreResponse = parse_json(strip_xssi_prefix(&body), "explore")?;
        Ok(explore.widgets)
    }

    /// Returns one slot per keyword holding the newest point that has data.
    async fn latest_scores(
        &self,
        widget: &Widget,
        keyword_count: usize,
    ) -> Result<Vec<Option<f64>>, SourceError> {
        let body = self.widget_data("trends/api/widgetdata/multiline", widget).await?;
        let response: MultilineResponse =
            parse_json(strip_xssi_prefix(&body), "widgetdata/multiline")?;

        let mut scores = vec![None; keyword_count];
        for point in &response.default.timeline_data {
            for (i, slot) in scores.iter_mut().enumerate() {
                let has_data = point.has_data.get(i).copied().unwrap_or(true);
                if let (true, Some(value)) = (has_data, point.value.get(i)) {
                    *slot = Some(value.clamp(0.0, 100.0));
                }
            }
        }
        Ok(scores)
    }

    async fn related_volume(&self, widget: &Widget) -> Result<i64, SourceError> {
        let body = self
            .widget_data("trends/api/widgetdata/relatedsearches", widget)
            .await?;
        let response: RelatedResponse =
            parse_json(strip_xssi_prefix(&body), "widgetdata/relatedsearches")?;
        // The first ranked list is "top"; the second is "rising".
        Ok(response
            .default
            .ranked_list
            .first()
            .map_or(0, |top| top.ranked_keyword.iter().map(|k| k.value).sum()))
    }

    async fn widget_data(&self, path: &str, widget: &Widget) -> Result<String, SourceError> {
        let mut url = join(&self.base_url, path)?;
        url.query_pairs_mut()
            .append_pair("hl", HOST_LANGUAGE)
            .append_pair("tz", TZ_OFFSET_MINUTES)
            .append_pair("req", &widget.request.to_string())
            .append_pair("token", &widget.token);
        send_text(self.client.get(url.clone()), &url).await
    }
}

/// `RELATED_QUERIES` for the first keyword, `RELATED_QUERIES_<n>` after that.
fn related_index(widget_id: &str) -> Option<usize> {
    let rest = widget_id.strip_prefix("RELATED_QUERIES")?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.strip_prefix('_')?.parse().ok()
}

/// Drops everything before the first `{` or `[`.
fn strip_xssi_prefix(body: &str) -> &str {
    body.find(['{', '['])
        .map_or(body, |start| &body[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_both_prefix_variants() {
        assert_eq!(strip_xssi_prefix(")]}'\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_xssi_prefix(")]}',\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_xssi_prefix("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn related_widget_ids_map_to_keyword_index() {
        assert_eq!(related_index("RELATED_QUERIES"), Some(0));
        assert_eq!(related_index("RELATED_QUERIES_3"), Some(3));
        assert_eq!(related_index("RELATED_TOPICS"), None);
        assert_eq!(related_index("TIMESERIES"), None);
    }
}
