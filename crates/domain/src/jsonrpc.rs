//! JSON-RPC 2.0 envelope types for the agent-facing transport (spec.md §6),
//! plus the tool-level vs transport-level error encoding spec.md §7
//! mandates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Transport-level error codes, per JSON-RPC 2.0 §5.1.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;

impl JsonRpcResponse {
    /// A successful JSON-RPC response carrying an arbitrary `result`.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A transport-level JSON-RPC error (bad envelope, unknown method) — the
    /// *only* path that uses the top-level `error` field.
    pub fn transport_error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// A tool-level failure: rides as a JSON-RPC *success* envelope whose
    /// `result.isError = true`, per spec.md §4.5 step 1's note.
    pub fn tool_error(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::success(
            id,
            serde_json::json!({
                "isError": true,
                "content": [{ "type": "text", "text": format!("[{code}] {message}") }],
                "errorCode": code.as_str(),
            }),
        )
    }

    /// A successful tool-call result: the executor's `output` value becomes
    /// the JSON-RPC `result`.
    pub fn tool_success(id: Value, output: Value) -> Self {
        Self::success(id, output)
    }
}
