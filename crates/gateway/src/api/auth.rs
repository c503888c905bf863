//! Bearer-token middleware gating the Executor-only endpoints (spec.md §6:
//! "This endpoint MUST be protected by network policy, mTLS, or a bearer
//! token"). Modeled on the teacher's `require_api_token`.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::GatewayState;

pub async fn require_executor_token(
    State(state): State<GatewayState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected_hash = match &state.executor_token_hash {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "invalid or missing executor token" })),
        )
            .into_response();
    }

    next.run(req).await
}
