use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heimdal_core::{EngagementMetrics, HashtagTrend, Platform, RecordBatch, SocialEngagement};
use heimdal_db::Repository;
use heimdal_sources::{Fetched, SourceError, TikTokClient, TikTokHashtag, TikTokVideo};

use super::{keep_valid, TIKTOK};
use crate::collector::{Collection, Collector};
use crate::error::CollectError;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// A video under a hashtag weighs as much as this many views.
const VIDEO_WEIGHT: i64 = 100;
const VIDEO_POST_TYPE: &str = "video";

/// Trending hashtags plus per-video engagement.
///
/// The two endpoints are fetched concurrently. If one of them fails with a
/// non-auth error the other's records are still returned; a rejected API key
/// fails the whole collect.
pub struct TikTokCollector {
    client: TikTokClient,
    repo: Arc<dyn Repository>,
    retry: RetryPolicy,
}

impl TikTokCollector {
    #[must_use]
    pub fn new(client: TikTokClient, repo: Arc<dyn Repository>, retry: RetryPolicy) -> Self {
        Self {
            client,
            repo,
            retry,
        }
    }
}

fn combine(
    hashtags: Result<Fetched<TikTokHashtag>, SourceError>,
    videos: Result<Fetched<TikTokVideo>, SourceError>,
) -> Result<(Fetched<TikTokHashtag>, Fetched<TikTokVideo>), SourceError> {
    if let Err(e @ SourceError::Auth { .. }) = hashtags {
        return Err(e);
    }
    if let Err(e @ SourceError::Auth { .. }) = videos {
        return Err(e);
    }
    match (hashtags, videos) {
        (Ok(h), Ok(v)) => Ok((h, v)),
        (Ok(h), Err(e)) => {
            tracing::warn!(error = %e, "tiktok: video list failed, keeping hashtags");
            Ok((h, Fetched::default()))
        }
        (Err(e), Ok(v)) => {
            tracing::warn!(error = %e, "tiktok: trending hashtags failed, keeping videos");
            Ok((Fetched::default(), v))
        }
        (Err(e), Err(other)) => {
            tracing::warn!(error = %other, "tiktok: video list failed");
            Err(e)
        }
    }
}

fn map_hashtags(
    fetched: Fetched<TikTokHashtag>,
    observed_at: DateTime<Utc>,
) -> (Vec<HashtagTrend>, usize) {
    let mapped = fetched.items.into_iter().map(|h| {
        let views = h.view_count.unwrap_or(0);
        let videos = h.video_count.unwrap_or(0);
        let engagement = views.saturating_add(videos.saturating_mul(VIDEO_WEIGHT));
        HashtagTrend::new(Platform::TikTok, &h.name, engagement, observed_at)?
            .with_volume(h.video_count)
    });
    let (trends, rejected) = keep_valid(TIKTOK, mapped);
    (trends, fetched.malformed + rejected)
}

fn map_videos(
    fetched: Fetched<TikTokVideo>,
    observed_at: DateTime<Utc>,
) -> (Vec<SocialEngagement>, usize) {
    let mapped = fetched.items.into_iter().map(|v| {
        let metrics = EngagementMetrics {
            likes: v.like_count,
            comments: v.comment_count,
            shares: v.share_count,
            reach: v.view_count,
            impressions: None,
        };
        SocialEngagement::new(
            Platform::TikTok,
            VIDEO_POST_TYPE,
            Some(v.id),
            metrics,
            v.description.as_deref().unwrap_or_default(),
            observed_at,
        )
    });
    let (records, rejected) = keep_valid(TIKTOK, mapped);
    (records, fetched.malformed + rejected)
}

#[async_trait]
impl Collector for TikTokCollector {
    fn name(&self) -> &'static str {
        TIKTOK
    }

    async fn collect(&self) -> Result<Collection, CollectError> {
        let (hashtags, videos) = tokio::join!(
            retry_with_backoff(self.retry, "tiktok hashtag/trending", || {
                self.client.fetch_trending_hashtags()
            }),
            retry_with_backoff(self.retry, "tiktok video/list", || self.client.fetch_videos()),
        );
        let (hashtags, videos) = combine(hashtags, videos)?;

        let observed_at = Utc::now();
        let (hashtag_trends, skipped_hashtags) = map_hashtags(hashtags, observed_at);
        let (engagement, skipped_videos) = map_videos(videos, observed_at);

        Ok(Collection {
            records: RecordBatch {
                hashtag_trends,
                engagement,
                seo_data: Vec::new(),
            },
            skipped: skipped_hashtags + skipped_videos,
        })
    }

    async fn save(&self, records: &RecordBatch) -> Result<u64, CollectError> {
        Ok(self.repo.save_batch(records).await?)
    }
}
