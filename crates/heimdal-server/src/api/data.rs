use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_days, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct DataQuery {
    pub limit: Option<i64>,
    pub days: Option<i64>,
}

impl DataQuery {
    fn since(&self) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::days(normalize_days(self.days))
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TrendItem {
    platform: String,
    hashtag: String,
    engagement: i64,
    engagement_rate: Option<f64>,
    volume: Option<i64>,
    observed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct EngagementItem {
    platform: String,
    post_type: String,
    post_id: Option<String>,
    likes: Option<i64>,
    comments: Option<i64>,
    shares: Option<i64>,
    reach: Option<i64>,
    impressions: Option<i64>,
    content_snippet: String,
    observed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct SeoItem {
    keyword: String,
    trend_score: Option<f64>,
    volume: Option<i64>,
    difficulty: Option<f64>,
    cpc: Option<f64>,
    competition: Option<f64>,
    source: String,
    observed_at: DateTime<Utc>,
}

pub(super) async fn list_trends(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DataQuery>,
) -> Result<Json<ApiResponse<Vec<TrendItem>>>, ApiError> {
    let rows = heimdal_db::list_recent_hashtag_trends(
        &state.pool,
        query.since(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| TrendItem {
            platform: row.platform,
            hashtag: row.hashtag,
            engagement: row.engagement,
            engagement_rate: row.engagement_rate,
            volume: row.volume,
            observed_at: row.observed_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_engagement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DataQuery>,
) -> Result<Json<ApiResponse<Vec<EngagementItem>>>, ApiError> {
    let rows =
        heimdal_db::list_recent_engagement(&state.pool, query.since(), normalize_limit(query.limit))
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| EngagementItem {
            platform: row.platform,
            post_type: row.post_type,
            post_id: row.post_id,
            likes: row.likes,
            comments: row.comments,
            shares: row.shares,
            reach: row.reach,
            impressions: row.impressions,
            content_snippet: row.content_snippet,
            observed_at: row.observed_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_seo(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DataQuery>,
) -> Result<Json<ApiResponse<Vec<SeoItem>>>, ApiError> {
    let rows =
        heimdal_db::list_recent_seo_data(&state.pool, query.since(), normalize_limit(query.limit))
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SeoItem {
            keyword: row.keyword,
            trend_score: row.trend_score,
            volume: row.volume,
            difficulty: row.difficulty,
            cpc: row.cpc,
            competition: row.competition,
            source: row.source,
            observed_at: row.observed_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use heimdal_core::{EngagementMetrics, HashtagTrend, Platform, SeoData, SocialEngagement};
    use heimdal_db::{PgRepository, Repository};
    use sqlx::PgPool;

    use super::super::tests::{json_body, send, test_app, test_state};

    fn trend(hashtag: &str, engagement: i64, days_ago: i64) -> HashtagTrend {
        HashtagTrend::new(
            Platform::Twitter,
            hashtag,
            engagement,
            chrono::Utc::now() - Duration::days(days_ago),
        )
        .expect("valid trend")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn trends_are_ordered_by_engagement_and_capped(pool: PgPool) {
        let repo = PgRepository::new(pool.clone());
        repo.save_hashtag_trends(&[trend("ten", 10, 0), trend("fifty", 50, 0), trend("thirty", 30, 0)])
            .await
            .expect("seed trends");

        let response = send(
            test_app(test_state(pool)),
            Method::GET,
            "/api/data/trends?limit=2&days=7",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let engagement: Vec<i64> = json["data"]
            .as_array()
            .expect("data array")
            .iter()
            .map(|item| item["engagement"].as_i64().expect("engagement"))
            .collect();
        assert_eq!(engagement, vec![50, 30]);
        assert_eq!(json["data"][0]["platform"], "twitter");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn trends_outside_the_window_are_excluded(pool: PgPool) {
        let repo = PgRepository::new(pool.clone());
        repo.save_hashtag_trends(&[trend("recent", 5, 1), trend("stale", 500, 30)])
            .await
            .expect("seed trends");

        let response = send(test_app(test_state(pool)), Method::GET, "/api/data/trends").await;

        let json = json_body(response).await;
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["hashtag"], "recent");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn engagement_is_newest_first_with_absent_metrics_as_null(pool: PgPool) {
        let repo = PgRepository::new(pool.clone());
        let metrics = EngagementMetrics {
            likes: Some(0),
            comments: Some(4),
            shares: None,
            reach: None,
            impressions: None,
        };
        let older = SocialEngagement::new(
            Platform::Facebook,
            "status",
            Some("p-1".to_string()),
            metrics,
            "older post",
            chrono::Utc::now() - Duration::days(2),
        )
        .expect("valid engagement");
        let newer = SocialEngagement::new(
            Platform::Facebook,
            "photo",
            Some("p-2".to_string()),
            metrics,
            "newer post",
            chrono::Utc::now(),
        )
        .expect("valid engagement");
        repo.save_engagement(&[older, newer])
            .await
            .expect("seed engagement");

        let response = send(
            test_app(test_state(pool)),
            Method::GET,
            "/api/data/engagement",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["data"][0]["post_id"], "p-2");
        assert_eq!(json["data"][1]["post_id"], "p-1");
        assert_eq!(json["data"][0]["likes"], 0);
        assert!(json["data"][0]["shares"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn seo_puts_unscored_keywords_last(pool: PgPool) {
        let repo = PgRepository::new(pool.clone());
        let make = |keyword: &str, score: Option<f64>| {
            SeoData::new(keyword, "Google Trends", chrono::Utc::now())
                .expect("valid seo")
                .with_trend_score(score)
                .expect("valid score")
        };
        repo.save_seo_data(&[make("none", None), make("high", Some(90.0)), make("low", Some(10.0))])
            .await
            .expect("seed seo");

        let response = send(test_app(test_state(pool)), Method::GET, "/api/data/seo").await;

        let json = json_body(response).await;
        let keywords: Vec<&str> = json["data"]
            .as_array()
            .expect("data array")
            .iter()
            .map(|item| item["keyword"].as_str().expect("keyword"))
            .collect();
        assert_eq!(keywords, vec!["high", "low", "none"]);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn empty_tables_return_an_empty_list(pool: PgPool) {
        let response = send(test_app(test_state(pool)), Method::GET, "/api/data/seo").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["data"], serde_json::json!([]));
    }
}
