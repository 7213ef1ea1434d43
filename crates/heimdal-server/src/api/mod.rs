mod collection_runs;
mod data;
mod fetch;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use heimdal_collectors::{CycleTrigger, Orchestrator, OrchestratorState};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{request_id, RequestId};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;
const DEFAULT_DAYS: i64 = 7;
const MAX_DAYS: i64 = 365;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub orchestrator: Arc<Orchestrator>,
    pub trigger: CycleTrigger,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub(super) fn normalize_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

pub(super) fn map_db_error(request_id: String, error: &heimdal_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn data_router() -> Router<AppState> {
    Router::new()
        .route("/api/data/trends", get(data::list_trends))
        .route("/api/data/engagement", get(data::list_engagement))
        .route("/api/data/seo", get(data::list_seo))
        .route("/api/data/runs", get(collection_runs::list_collection_runs))
        .route("/api/data/fetch", post(fetch::trigger_fetch))
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .merge(data_router())
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct IndexData {
    service: &'static str,
    version: &'static str,
    endpoints: &'static [&'static str],
}

async fn index(Extension(req_id): Extension<RequestId>) -> Json<ApiResponse<IndexData>> {
    Json(ApiResponse {
        data: IndexData {
            service: "heimdal",
            version: env!("CARGO_PKG_VERSION"),
            endpoints: &[
                "GET /health",
                "GET /api/data/trends",
                "GET /api/data/engagement",
                "GET /api/data/seo",
                "GET /api/data/runs",
                "POST /api/data/fetch",
            ],
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    scheduler: SchedulerHealth,
}

#[derive(Debug, Serialize)]
struct SchedulerHealth {
    orchestrator: OrchestratorState,
    cycle_running: bool,
    accepting_requests: bool,
    enabled_collectors: Vec<&'static str>,
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let scheduler = SchedulerHealth {
        orchestrator: state.orchestrator.state(),
        cycle_running: state.trigger.is_running(),
        accepting_requests: !state.trigger.is_stopped(),
        enabled_collectors: state.orchestrator.registry().enabled_names().await,
    };

    match heimdal_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    scheduler,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        scheduler,
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::response::Response;
    use heimdal_collectors::{CollectorRegistry, CycleRunner};
    use heimdal_db::{PgRepository, Repository};
    use tower::ServiceExt;

    use super::*;

    pub(crate) fn test_state(pool: PgPool) -> AppState {
        let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(pool.clone()));
        let registry = Arc::new(CollectorRegistry::new(Vec::new()));
        let orchestrator = Arc::new(Orchestrator::new(registry, repo, Duration::from_secs(5)));
        let trigger = CycleTrigger::new(Arc::clone(&orchestrator) as Arc<dyn CycleRunner>);
        AppState {
            pool,
            orchestrator,
            trigger,
        }
    }

    pub(crate) fn test_app(state: AppState) -> Router {
        build_app(state)
    }

    pub(crate) async fn send(app: Router, method: Method, uri: &str) -> Response {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
    }

    pub(crate) async fn json_body(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(-5)), 1);
        assert_eq!(normalize_limit(Some(10_000)), 500);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn normalize_days_applies_defaults_and_bounds() {
        assert_eq!(normalize_days(None), 7);
        assert_eq!(normalize_days(Some(0)), 1);
        assert_eq!(normalize_days(Some(400)), 365);
        assert_eq!(normalize_days(Some(30)), 30);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn index_lists_endpoints(pool: PgPool) {
        let response = send(test_app(test_state(pool)), Method::GET, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["data"]["service"], "heimdal");
        assert!(json["data"]["endpoints"]
            .as_array()
            .expect("endpoints")
            .iter()
            .any(|e| e == "POST /api/data/fetch"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_database_and_scheduler_state(pool: PgPool) {
        let response = send(test_app(test_state(pool)), Method::GET, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["database"], "ok");
        assert_eq!(json["data"]["scheduler"]["orchestrator"], "idle");
        assert_eq!(json["data"]["scheduler"]["cycle_running"], false);
        assert_eq!(json["data"]["scheduler"]["accepting_requests"], true);
    }
}
