//! Context-fetch endpoints (spec.md §6), Executor-only: `GET
//! /context/{requestId}` (claim the stored body, single-consume) and `GET
//! /context` (monitoring counters).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::state::GatewayState;

pub async fn fetch(State(state): State<GatewayState>, Path(request_id): Path<String>) -> Response {
    match state.context.fetch_and_consume(&request_id) {
        Some(context) => (
            StatusCode::OK,
            Json(serde_json::json!({ "found": true, "context": context })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "found": false,
                "error": "Context not found or already consumed",
            })),
        ),
    }
    .into_response()
}

pub async fn monitoring(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "stored": state.context.count(),
        "consumed": state.context.consumed_count(),
    }))
}
