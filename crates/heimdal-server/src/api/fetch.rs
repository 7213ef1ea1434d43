use axum::{extract::State, http::StatusCode, Extension, Json};
use heimdal_collectors::{CycleSource, TriggerAck};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct FetchAck {
    ack: TriggerAck,
}

/// Hands an on-demand cycle to the trigger and answers without waiting for it.
pub(super) async fn trigger_fetch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> (StatusCode, Json<ApiResponse<FetchAck>>) {
    let ack = state.trigger.request(CycleSource::OnDemand);
    tracing::info!(request_id = %req_id.0, ack = ?ack, "on-demand fetch requested");

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: FetchAck { ack },
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}
