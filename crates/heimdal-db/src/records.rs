//! Inserts and read-model queries for `hashtag_trends`, `social_engagement`
//! and `seo_data`.
//!
//! The insert helpers take a connection rather than a pool so callers can run
//! several of them inside one transaction.

use chrono::{DateTime, Utc};
use heimdal_core::{EngagementMetrics, HashtagTrend, Platform, SeoData, SocialEngagement};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `hashtag_trends` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HashtagTrendRow {
    pub id: i64,
    pub platform: String,
    pub hashtag: String,
    pub engagement: i64,
    pub engagement_rate: Option<f64>,
    pub volume: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

/// A row from the `social_engagement` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SocialEngagementRow {
    pub id: i64,
    pub platform: String,
    pub post_type: String,
    pub post_id: Option<String>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub reach: Option<i64>,
    pub impressions: Option<i64>,
    pub content_snippet: String,
    pub observed_at: DateTime<Utc>,
}

/// A row from the `seo_data` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SeoDataRow {
    pub id: i64,
    pub keyword: String,
    pub trend_score: Option<f64>,
    pub volume: Option<i64>,
    pub difficulty: Option<f64>,
    pub cpc: Option<f64>,
    pub competition: Option<f64>,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

fn parse_platform(raw: &str) -> Result<Platform, DbError> {
    raw.parse::<Platform>()
        .map_err(|e| DbError::InvalidRow(e.to_string()))
}

impl TryFrom<HashtagTrendRow> for HashtagTrend {
    type Error = DbError;

    fn try_from(row: HashtagTrendRow) -> Result<Self, Self::Error> {
        Ok(HashtagTrend {
            platform: parse_platform(&row.platform)?,
            hashtag: row.hashtag,
            engagement: row.engagement,
            engagement_rate: row.engagement_rate,
            volume: row.volume,
            observed_at: row.observed_at,
        })
    }
}

impl TryFrom<SocialEngagementRow> for SocialEngagement {
    type Error = DbError;

    fn try_from(row: SocialEngagementRow) -> Result<Self, Self::Error> {
        Ok(SocialEngagement {
            platform: parse_platform(&row.platform)?,
            post_type: row.post_type,
            post_id: row.post_id,
            metrics: EngagementMetrics {
                likes: row.likes,
                comments: row.comments,
                shares: row.shares,
                reach: row.reach,
                impressions: row.impressions,
            },
            content_snippet: row.content_snippet,
            observed_at: row.observed_at,
        })
    }
}

impl From<SeoDataRow> for SeoData {
    fn from(row: SeoDataRow) -> Self {
        SeoData {
            keyword: row.keyword,
            trend_score: row.trend_score,
            volume: row.volume,
            difficulty: row.difficulty,
            cpc: row.cpc,
            competition: row.competition,
            source: row.source,
            observed_at: row.observed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Inserts
// ---------------------------------------------------------------------------

/// Inserts every trend on `conn`, returning the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on the first failing insert. Rows already written
/// on `conn` are only discarded if the caller's transaction is rolled back.
pub async fn insert_hashtag_trends(
    conn: &mut PgConnection,
    trends: &[HashtagTrend],
) -> Result<u64, DbError> {
    let mut written = 0;
    for trend in trends {
        let result = sqlx::query(
            "INSERT INTO hashtag_trends \
                 (platform, hashtag, engagement, engagement_rate, volume, observed_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(trend.platform.as_str())
        .bind(&trend.hashtag)
        .bind(trend.engagement)
        .bind(trend.engagement_rate)
        .bind(trend.volume)
        .bind(trend.observed_at)
        .execute(&mut *conn)
        .await?;
        written += result.rows_affected();
    }
    Ok(written)
}

/// Inserts every engagement record on `conn`, returning the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on the first failing insert.
pub async fn insert_engagement(
    conn: &mut PgConnection,
    records: &[SocialEngagement],
) -> Result<u64, DbError> {
    let mut written = 0;
    for record in records {
        let m = &record.metrics;
        let result = sqlx::query(
            "INSERT INTO social_engagement \
                 (platform, post_type, post_id, likes, comments, shares, reach, \
                  impressions, content_snippet, observed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.platform.as_str())
        .bind(&record.post_type)
        .bind(record.post_id.as_deref())
        .bind(m.likes)
        .bind(m.comments)
        .bind(m.shares)
        .bind(m.reach)
        .bind(m.impressions)
        .bind(&record.content_snippet)
        .bind(record.observed_at)
        .execute(&mut *conn)
        .await?;
        written += result.rows_affected();
    }
    Ok(written)
}

/// Inserts every SEO record on `conn`, returning the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on the first failing insert.
pub async fn insert_seo_data(conn: &mut PgConnection, records: &[SeoData]) -> Result<u64, DbError> {
    let mut written = 0;
    for record in records {
        let result = sqlx::query(
            "INSERT INTO seo_data \
                 (keyword, trend_score, volume, difficulty, cpc, competition, source, observed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.keyword)
        .bind(record.trend_score)
        .bind(record.volume)
        .bind(record.difficulty)
        .bind(record.cpc)
        .bind(record.competition)
        .bind(&record.source)
        .bind(record.observed_at)
        .execute(&mut *conn)
        .await?;
        written += result.rows_affected();
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Read model
// ---------------------------------------------------------------------------

/// Trends observed at or after `since`, highest engagement first.
///
/// Ties are broken by `observed_at DESC, id DESC` so pagination is stable.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_hashtag_trends(
    pool: &PgPool,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<HashtagTrendRow>, DbError> {
    let rows = sqlx::query_as::<_, HashtagTrendRow>(
        "SELECT id, platform, hashtag, engagement, engagement_rate, volume, observed_at \
         FROM hashtag_trends \
         WHERE observed_at >= $1 \
         ORDER BY engagement DESC, observed_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Engagement records observed at or after `since`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_engagement(
    pool: &PgPool,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<SocialEngagementRow>, DbError> {
    let rows = sqlx::query_as::<_, SocialEngagementRow>(
        "SELECT id, platform, post_type, post_id, likes, comments, shares, reach, \
                impressions, content_snippet, observed_at \
         FROM social_engagement \
         WHERE observed_at >= $1 \
         ORDER BY observed_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// SEO records observed at or after `since`, highest trend score first with
/// unscored rows last.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_seo_data(
    pool: &PgPool,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<SeoDataRow>, DbError> {
    let rows = sqlx::query_as::<_, SeoDataRow>(
        "SELECT id, keyword, trend_score, volume, difficulty, cpc, competition, source, \
                observed_at \
         FROM seo_data \
         WHERE observed_at >= $1 \
         ORDER BY trend_score DESC NULLS LAST, observed_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
