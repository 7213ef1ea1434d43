use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heimdal_core::{HashtagTrend, Platform, RecordBatch};
use heimdal_db::Repository;
use heimdal_sources::{Fetched, TwitterClient, TwitterTrend};

use super::{keep_valid, TWITTER};
use crate::collector::{Collection, Collector};
use crate::error::CollectError;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Hashtag trends for one WOEID.
pub struct TwitterCollector {
    client: TwitterClient,
    woeid: u32,
    repo: Arc<dyn Repository>,
    retry: RetryPolicy,
}

impl TwitterCollector {
    #[must_use]
    pub fn new(
        client: TwitterClient,
        woeid: u32,
        repo: Arc<dyn Repository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            woeid,
            repo,
            retry,
        }
    }
}

/// Keeps only `#`-prefixed trends. Plain-phrase trends are not hashtags and
/// are dropped without counting as skipped.
fn map_trends(fetched: Fetched<TwitterTrend>, observed_at: DateTime<Utc>) -> Collection {
    let mapped = fetched
        .items
        .into_iter()
        .filter(|t| t.name.starts_with('#'))
        .map(|t| {
            HashtagTrend::new(
                Platform::Twitter,
                &t.name,
                t.tweet_volume.unwrap_or(0),
                observed_at,
            )?
            .with_volume(t.tweet_volume)
        });
    let (trends, rejected) = keep_valid(TWITTER, mapped);
    Collection::new(trends, fetched.malformed + rejected)
}

#[async_trait]
impl Collector for TwitterCollector {
    fn name(&self) -> &'static str {
        TWITTER
    }

    async fn collect(&self) -> Result<Collection, CollectError> {
        let fetched = retry_with_backoff(self.retry, "twitter trends/place", || {
            self.client.fetch_place_trends(self.woeid)
        })
        .await?;
        Ok(map_trends(fetched, Utc::now()))
    }

    async fn save(&self, records: &RecordBatch) -> Result<u64, CollectError> {
        Ok(self.repo.save_hashtag_trends(&records.hashtag_trends).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend(name: &str, tweet_volume: Option<i64>) -> TwitterTrend {
        TwitterTrend {
            name: name.to_string(),
            tweet_volume,
        }
    }

    #[test]
    fn keeps_hashtags_and_strips_prefix() {
        let fetched = Fetched {
            items: vec![
                trend("#RustLang", Some(12_000)),
                trend("World Cup", Some(900_000)),
                trend("#NoVolume", None),
            ],
            malformed: 2,
        };
        let collection = map_trends(fetched, Utc::now());
        let trends = &collection.records.hashtag_trends;

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].hashtag, "RustLang");
        assert_eq!(trends[0].engagement, 12_000);
        assert_eq!(trends[0].volume, Some(12_000));
        assert_eq!(trends[1].engagement, 0);
        assert_eq!(trends[1].volume, None);
        assert_eq!(collection.skipped, 2);
    }

    #[test]
    fn bare_hash_and_negative_volume_are_skipped() {
        let fetched = Fetched {
            items: vec![trend("#", Some(5)), trend("#odd", Some(-1))],
            malformed: 0,
        };
        let collection = map_trends(fetched, Utc::now());
        assert!(collection.records.is_empty());
        assert_eq!(collection.skipped, 2);
    }
    #[test]
    fn over_long_hashtag_is_skipped_without_losing_the_rest() {
        let fetched = Fetched {
            items: vec![
                trend("#ok1", Some(1)),
                trend(&format!("#{}", "a".repeat(300)), Some(2)),
                trend("#ok2", Some(3)),
            ],
            malformed: 0,
        };
        let collection = map_trends(fetched, Utc::now());
        let hashtags: Vec<_> = collection
            .records
            .hashtag_trends
            .iter()
            .map(|t| t.hashtag.as_str())
            .collect();
        assert_eq!(hashtags, vec!["ok1", "ok2"]);
        assert_eq!(collection.skipped, 1);
    }
}
