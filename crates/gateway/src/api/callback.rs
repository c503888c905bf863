//! Callback endpoint (spec.md §6), Executor-only: `POST /callback` delivers
//! an `ExecuteResult` to C4. Duplicate callbacks for the same `requestId`
//! are tolerated — `Rendezvous::complete` on an already-completed or
//! unknown id is a no-op.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use npg_domain::model::ExecuteResult;

use crate::state::GatewayState;

pub async fn receive(State(state): State<GatewayState>, Json(result): Json<ExecuteResult>) -> impl IntoResponse {
    let request_id = result.request_id.clone();
    state.rendezvous.complete(&request_id, result);
    Json(serde_json::json!({ "status": "received" }))
}
