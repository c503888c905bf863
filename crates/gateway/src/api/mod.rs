pub mod auth;
pub mod callback;
pub mod context;
pub mod rpc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::GatewayState;

/// Build the full HTTP router: the agent-facing JSON-RPC endpoint is open,
/// the Executor-only context-fetch and callback endpoints sit behind the
/// bearer-token middleware (spec.md §6).
pub fn router(state: GatewayState) -> Router<GatewayState> {
    let public = Router::new().route("/", post(rpc::handle));

    let executor_only = Router::new()
        .route("/context", get(context::monitoring))
        .route("/context/:request_id", get(context::fetch))
        .route("/callback", post(callback::receive))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_executor_token,
        ));

    public.merge(executor_only).layer(tower_http::trace::TraceLayer::new_for_http())
}
