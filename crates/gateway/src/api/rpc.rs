//! Agent-facing JSON-RPC 2.0 endpoint (spec.md §6): `initialize`,
//! `tools/list`, `tools/call`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use serde_json::Value;

use npg_domain::jsonrpc::{JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};

use crate::mediator::{self, CallerContext};
use crate::state::GatewayState;

/// POST `/` — the single JSON-RPC entry point. A malformed envelope still
/// gets a well-formed JSON-RPC response (`id: null`, transport-level
/// `error`), per spec.md §6.
pub async fn handle(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return Json(JsonRpcResponse::transport_error(
                Value::Null,
                PARSE_ERROR,
                format!("invalid JSON-RPC request: {e}"),
            ));
        }
    };

    let caller = caller_from_headers(&headers);
    let id = request.id.clone();

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": { "name": "npg-gateway", "version": env!("CARGO_PKG_VERSION") },
                "capabilities": { "tools": {} },
            }),
        ),
        "tools/list" => mediator::list_tools(&state, id).await,
        "tools/call" => handle_tools_call(&state, id, request.params, &caller).await,
        other => JsonRpcResponse::transport_error(
            id,
            METHOD_NOT_FOUND,
            format!("unknown method \"{other}\""),
        ),
    };

    Json(response)
}

async fn handle_tools_call(
    state: &GatewayState,
    id: Value,
    params: Option<Value>,
    caller: &CallerContext,
) -> JsonRpcResponse {
    let Some(params) = params else {
        return JsonRpcResponse::transport_error(id, INVALID_REQUEST, "missing params");
    };
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::transport_error(id, INVALID_REQUEST, "params.name must be a string");
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));

    mediator::handle_tool_call(state, id, name, arguments, caller).await
}

/// Caller identity is not part of spec.md's JSON-RPC envelope; this
/// implementation derives it from `X-Tenant-Id` / `X-User-Id` request
/// headers, defaulting to a single-tenant dev identity when absent.
fn caller_from_headers(headers: &HeaderMap) -> CallerContext {
    let header_str = |name: &str, default: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    CallerContext {
        tenant_id: header_str("x-tenant-id", "default"),
        user_id: header_str("x-user-id", "anonymous"),
    }
}
