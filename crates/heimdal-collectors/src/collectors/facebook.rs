use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heimdal_core::{EngagementMetrics, Platform, RecordBatch, SocialEngagement};
use heimdal_db::Repository;
use heimdal_sources::{FacebookClient, FacebookPost, Fetched};

use super::{keep_valid, FACEBOOK};
use crate::collector::{Collection, Collector};
use crate::error::CollectError;
use crate::retry::{retry_with_backoff, RetryPolicy};

const UNKNOWN_POST_TYPE: &str = "unknown";

/// Post engagement for one Facebook page.
pub struct FacebookCollector {
    client: FacebookClient,
    page_id: String,
    repo: Arc<dyn Repository>,
    retry: RetryPolicy,
}

impl FacebookCollector {
    #[must_use]
    pub fn new(
        client: FacebookClient,
        page_id: impl Into<String>,
        repo: Arc<dyn Repository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            page_id: page_id.into(),
            repo,
            retry,
        }
    }
}

fn map_posts(fetched: Fetched<FacebookPost>, observed_at: DateTime<Utc>) -> Collection {
    let mapped = fetched.items.into_iter().map(|post| {
        let metrics = EngagementMetrics {
            likes: post.like_count(),
            comments: post.comment_count(),
            shares: post.share_count(),
            ..EngagementMetrics::default()
        };
        SocialEngagement::new(
            Platform::Facebook,
            post.status_type.as_deref().unwrap_or(UNKNOWN_POST_TYPE),
            Some(post.id),
            metrics,
            post.message.as_deref().unwrap_or_default(),
            observed_at,
        )
    });
    let (records, rejected) = keep_valid(FACEBOOK, mapped);
    Collection::new(records, fetched.malformed + rejected)
}

#[async_trait]
impl Collector for FacebookCollector {
    fn name(&self) -> &'static str {
        FACEBOOK
    }

    async fn collect(&self) -> Result<Collection, CollectError> {
        let fetched = retry_with_backoff(self.retry, "facebook page posts", || {
            self.client.fetch_page_posts(&self.page_id)
        })
        .await?;
        Ok(map_posts(fetched, Utc::now()))
    }

    async fn save(&self, records: &RecordBatch) -> Result<u64, CollectError> {
        Ok(self.repo.save_engagement(&records.engagement).await?)
    }
}
