use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use heimdal_db::CollectionRunCollectorRow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CollectionRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CollectionRunItem {
    collection_run_id: Uuid,
    trigger_source: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    items_saved: i32,
    error_message: Option<String>,
    collectors: Vec<CollectorRunItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct CollectorRunItem {
    collector: String,
    outcome: String,
    success: bool,
    items: i32,
    skipped: i32,
    duration_ms: i64,
    error_kind: Option<String>,
    error_message: Option<String>,
}

impl From<CollectionRunCollectorRow> for CollectorRunItem {
    fn from(row: CollectionRunCollectorRow) -> Self {
        Self {
            collector: row.collector,
            outcome: row.outcome,
            success: row.success,
            items: row.items,
            skipped: row.skipped,
            duration_ms: row.duration_ms,
            error_kind: row.error_kind,
            error_message: row.error_message,
        }
    }
}

pub(super) async fn list_collection_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CollectionRunsQuery>,
) -> Result<Json<ApiResponse<Vec<CollectionRunItem>>>, ApiError> {
    let rows = heimdal_db::list_collection_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let run_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut collectors_by_run: HashMap<i64, Vec<CollectorRunItem>> = HashMap::new();
    for row in heimdal_db::list_collection_run_collectors(&state.pool, &run_ids)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
    {
        collectors_by_run
            .entry(row.collection_run_id)
            .or_default()
            .push(row.into());
    }

    let data = rows
        .into_iter()
        .map(|row| CollectionRunItem {
            collection_run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            items_saved: row.items_saved,
            error_message: row.error_message,
            collectors: collectors_by_run.remove(&row.id).unwrap_or_default(),
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
