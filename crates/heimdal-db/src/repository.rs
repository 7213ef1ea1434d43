//! The persistence seam collectors and the orchestrator write through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heimdal_core::{HashtagTrend, RecordBatch, SeoData, SocialEngagement};
use sqlx::PgPool;
use uuid::Uuid;

use crate::collection_runs::{create_collection_run, finish_collection_run, RunOutcome};
use crate::records::{insert_engagement, insert_hashtag_trends, insert_seo_data};
use crate::DbError;

/// Atomic writes for normalized records plus the collection-run ledger.
///
/// Every `save_*` call runs in its own transaction: either the whole slice is
/// visible afterwards or none of it is.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn save_hashtag_trends(&self, trends: &[HashtagTrend]) -> Result<u64, DbError>;

    async fn save_engagement(&self, records: &[SocialEngagement]) -> Result<u64, DbError>;

    async fn save_seo_data(&self, records: &[SeoData]) -> Result<u64, DbError>;

    /// Writes records of every kind in a single transaction.
    async fn save_batch(&self, batch: &RecordBatch) -> Result<u64, DbError>;

    /// Opens a ledger row for a cycle and returns its id.
    async fn start_run(
        &self,
        cycle_id: Uuid,
        trigger_source: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, DbError>;

    async fn finish_run(&self, run_id: i64, outcome: &RunOutcome) -> Result<(), DbError>;
}

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn save_hashtag_trends(&self, trends: &[HashtagTrend]) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let written = insert_hashtag_trends(&mut *tx, trends).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn save_engagement(&self, records: &[SocialEngagement]) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let written = insert_engagement(&mut *tx, records).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn save_seo_data(&self, records: &[SeoData]) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let written = insert_seo_data(&mut *tx, records).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn save_batch(&self, batch: &RecordBatch) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut written = insert_hashtag_trends(&mut *tx, &batch.hashtag_trends).await?;
        written += insert_engagement(&mut *tx, &batch.engagement).await?;
        written += insert_seo_data(&mut *tx, &batch.seo_data).await?;
        tx.commit().await?;
        tracing::debug!(written, "repository: batch committed");
        Ok(written)
    }

    async fn start_run(
        &self,
        cycle_id: Uuid,
        trigger_source: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let row = create_collection_run(&self.pool, cycle_id, trigger_source, started_at).await?;
        Ok(row.id)
    }

    async fn finish_run(&self, run_id: i64, outcome: &RunOutcome) -> Result<(), DbError> {
        finish_collection_run(&self.pool, run_id, outcome).await
    }
}
