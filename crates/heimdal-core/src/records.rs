//! Normalized records produced by collectors and persisted by the repository.
//!
//! Records are immutable once built. The constructors enforce the invariants
//! that the database schema relies on, so a collector that maps a malformed
//! upstream item gets a [`RecordError`] back and can skip the item.

use std::sync::LazyLock;

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on `content_snippet`, counted in characters.
pub const CONTENT_SNIPPET_MAX_CHARS: usize = 255;

/// Column width for hashtags, keywords and post ids.
pub const IDENTIFIER_MAX_CHARS: usize = 255;

/// Column width for short labels such as `post_type` and `source`.
pub const LABEL_MAX_CHARS: usize = 50;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("hashtag is empty")]
    EmptyHashtag,

    #[error("keyword is empty")]
    EmptyKeyword,

    #[error("post type is empty")]
    EmptyPostType,

    #[error("source label is empty")]
    EmptySource,

    #[error("{field} must be non-negative, got {value}")]
    NegativeMetric { field: &'static str, value: i64 },

    #[error("trend score must be within [0, 100], got {0}")]
    TrendScoreOutOfRange(f64),

    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

/// The fixed set of upstream sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "twitter")]
    Twitter,
    #[serde(rename = "facebook")]
    Facebook,
    #[serde(rename = "tiktok")]
    TikTok,
    #[serde(rename = "google_trends")]
    GoogleTrends,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Facebook,
        Platform::TikTok,
        Platform::GoogleTrends,
    ];

    /// Storage and collector name for the platform.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::TikTok => "tiktok",
            Platform::GoogleTrends => "google_trends",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| RecordError::UnknownPlatform(s.to_string()))
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), RecordError> {
    if value.chars().count() > max {
        return Err(RecordError::TooLong { field, max });
    }
    Ok(())
}

/// Postgres keeps microseconds; anything finer would not survive a round trip.
fn storage_precision(observed_at: DateTime<Utc>) -> DateTime<Utc> {
    observed_at.trunc_subsecs(6)
}

fn check_non_negative(field: &'static str, value: Option<i64>) -> Result<(), RecordError> {
    match value {
        Some(v) if v < 0 => Err(RecordError::NegativeMetric { field, value: v }),
        _ => Ok(()),
    }
}

/// A trending hashtag observed on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashtagTrend {
    pub platform: Platform,
    /// Hashtag text without the leading `#`.
    pub hashtag: String,
    pub engagement: i64,
    pub engagement_rate: Option<f64>,
    pub volume: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

impl HashtagTrend {
    /// Builds a trend, stripping leading `#` characters and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyHashtag`] if nothing is left after stripping,
    /// or [`RecordError::NegativeMetric`] for a negative engagement count.
    pub fn new(
        platform: Platform,
        hashtag: &str,
        engagement: i64,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let hashtag = hashtag.trim().trim_start_matches('#').trim();
        if hashtag.is_empty() {
            return Err(RecordError::EmptyHashtag);
        }
        check_len("hashtag", hashtag, IDENTIFIER_MAX_CHARS)?;
        check_non_negative("engagement", Some(engagement))?;
        Ok(Self {
            platform,
            hashtag: hashtag.to_string(),
            engagement,
            engagement_rate: None,
            volume: None,
            observed_at: storage_precision(observed_at),
        })
    }

    #[must_use]
    pub fn with_engagement_rate(mut self, rate: Option<f64>) -> Self {
        self.engagement_rate = rate.filter(|r| r.is_finite());
        self
    }

    /// # Errors
    ///
    /// Returns [`RecordError::NegativeMetric`] for a negative volume.
    pub fn with_volume(mut self, volume: Option<i64>) -> Result<Self, RecordError> {
        check_non_negative("volume", volume)?;
        self.volume = volume;
        Ok(self)
    }
}

/// Per-post counters. `None` means the source did not report the metric,
/// which is distinct from a reported zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub reach: Option<i64>,
    pub impressions: Option<i64>,
}

impl EngagementMetrics {
    fn validate(&self) -> Result<(), RecordError> {
        check_non_negative("likes", self.likes)?;
        check_non_negative("comments", self.comments)?;
        check_non_negative("shares", self.shares)?;
        check_non_negative("reach", self.reach)?;
        check_non_negative("impressions", self.impressions)
    }
}

/// Engagement counters for a single post, video or similar item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialEngagement {
    pub platform: Platform,
    /// Upstream content kind, e.g. `"status"`, `"photo"`, `"video"`.
    pub post_type: String,
    pub post_id: Option<String>,
    #[serde(flatten)]
    pub metrics: EngagementMetrics,
    pub content_snippet: String,
    pub observed_at: DateTime<Utc>,
}

impl SocialEngagement {
    /// # Errors
    ///
    /// Returns [`RecordError`] for an empty post type or a negative metric.
    pub fn new(
        platform: Platform,
        post_type: &str,
        post_id: Option<String>,
        metrics: EngagementMetrics,
        content: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let post_type = post_type.trim();
        if post_type.is_empty() {
            return Err(RecordError::EmptyPostType);
        }
        check_len("post_type", post_type, LABEL_MAX_CHARS)?;
        let post_id = post_id.filter(|id| !id.trim().is_empty());
        if let Some(id) = &post_id {
            check_len("post_id", id, IDENTIFIER_MAX_CHARS)?;
        }
        metrics.validate()?;
        Ok(Self {
            platform,
            post_type: post_type.to_string(),
            post_id,
            metrics,
            content_snippet: truncate_snippet(content),
            observed_at: storage_precision(observed_at),
        })
    }
}

/// Search-interest data for one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoData {
    pub keyword: String,
    /// Relative interest on a 0 to 100 scale.
    pub trend_score: Option<f64>,
    pub volume: Option<i64>,
    pub difficulty: Option<f64>,
    pub cpc: Option<f64>,
    pub competition: Option<f64>,
    /// Where the figures came from, e.g. `"Google Trends"`.
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl SeoData {
    /// # Errors
    ///
    /// Returns [`RecordError`] for an empty keyword or source label.
    pub fn new(keyword: &str, source: &str, observed_at: DateTime<Utc>) -> Result<Self, RecordError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(RecordError::EmptyKeyword);
        }
        check_len("keyword", keyword, IDENTIFIER_MAX_CHARS)?;
        let source = source.trim();
        if source.is_empty() {
            return Err(RecordError::EmptySource);
        }
        check_len("source", source, LABEL_MAX_CHARS)?;
        Ok(Self {
            keyword: keyword.to_string(),
            trend_score: None,
            volume: None,
            difficulty: None,
            cpc: None,
            competition: None,
            source: source.to_string(),
            observed_at: storage_precision(observed_at),
        })
    }

    /// # Errors
    ///
    /// Returns [`RecordError::TrendScoreOutOfRange`] outside `[0, 100]` or for NaN.
    pub fn with_trend_score(mut self, score: Option<f64>) -> Result<Self, RecordError> {
        if let Some(s) = score {
            if !(0.0..=100.0).contains(&s) {
                return Err(RecordError::TrendScoreOutOfRange(s));
            }
        }
        self.trend_score = score;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`RecordError::NegativeMetric`] for a negative volume.
    pub fn with_volume(mut self, volume: Option<i64>) -> Result<Self, RecordError> {
        check_non_negative("volume", volume)?;
        self.volume = volume;
        Ok(self)
    }
}

/// Records of every kind produced by one `collect` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub hashtag_trends: Vec<HashtagTrend>,
    pub engagement: Vec<SocialEngagement>,
    pub seo_data: Vec<SeoData>,
}

impl RecordBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.hashtag_trends.len() + self.engagement.len() + self.seo_data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, other: RecordBatch) {
        self.hashtag_trends.extend(other.hashtag_trends);
        self.engagement.extend(other.engagement);
        self.seo_data.extend(other.seo_data);
    }
}

impl From<Vec<HashtagTrend>> for RecordBatch {
    fn from(hashtag_trends: Vec<HashtagTrend>) -> Self {
        Self {
            hashtag_trends,
            ..Self::default()
        }
    }
}

impl From<Vec<SocialEngagement>> for RecordBatch {
    fn from(engagement: Vec<SocialEngagement>) -> Self {
        Self {
            engagement,
            ..Self::default()
        }
    }
}

impl From<Vec<SeoData>> for RecordBatch {
    fn from(seo_data: Vec<SeoData>) -> Self {
        Self {
            seo_data,
            ..Self::default()
        }
    }
}

/// Collapses whitespace runs to single spaces, trims, and cuts the result to
/// [`CONTENT_SNIPPET_MAX_CHARS`] characters on a char boundary.
#[must_use]
pub fn truncate_snippet(content: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(content.trim(), " ");
    collapsed.chars().take(CONTENT_SNIPPET_MAX_CHARS).collect()
}
