use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heimdal_core::{RecordBatch, RecordError, SeoData};
use heimdal_db::Repository;
use heimdal_sources::{GoogleTrendsClient, KeywordInterest};

use super::{keep_valid, GOOGLE_TRENDS};
use crate::collector::{Collection, Collector};
use crate::error::CollectError;
use crate::retry::{retry_with_backoff, RetryPolicy};

const SOURCE_LABEL: &str = "Google Trends";

/// Search interest for a configured keyword list. Needs no credentials.
///
/// An upstream failure is reported as a failed collect. No placeholder
/// figures are ever substituted.
pub struct GoogleTrendsCollector {
    client: GoogleTrendsClient,
    keywords: Vec<String>,
    geo: String,
    repo: Arc<dyn Repository>,
    retry: RetryPolicy,
}

impl GoogleTrendsCollector {
    #[must_use]
    pub fn new(
        client: GoogleTrendsClient,
        keywords: Vec<String>,
        geo: impl Into<String>,
        repo: Arc<dyn Repository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            keywords,
            geo: geo.into(),
            repo,
            retry,
        }
    }
}

fn to_seo_data(
    interest: KeywordInterest,
    observed_at: DateTime<Utc>,
) -> Result<SeoData, RecordError> {
    SeoData::new(&interest.keyword, SOURCE_LABEL, observed_at)?
        .with_trend_score(Some(interest.trend_score))?
        .with_volume(interest.related_volume)
}

#[async_trait]
impl Collector for GoogleTrendsCollector {
    fn name(&self) -> &'static str {
        GOOGLE_TRENDS
    }

    async fn collect(&self) -> Result<Collection, CollectError> {
        if self.keywords.is_empty() {
            return Ok(Collection::default());
        }
        let interest = retry_with_backoff(self.retry, "google trends interest", || {
            self.client.fetch_interest(&self.keywords, &self.geo)
        })
        .await?;

        if interest.len() < self.keywords.len() {
            tracing::debug!(
                requested = self.keywords.len(),
                returned = interest.len(),
                "google_trends: some keywords had no data"
            );
        }

        let observed_at = Utc::now();
        let (records, rejected) = keep_valid(
            GOOGLE_TRENDS,
            interest.into_iter().map(|i| to_seo_data(i, observed_at)),
        );
        Ok(Collection::new(records, rejected))
    }

    async fn save(&self, records: &RecordBatch) -> Result<u64, CollectError> {
        Ok(self.repo.save_seo_data(&records.seo_data).await?)
    }
}
