//! Core data model (spec.md §3): service/tool definitions, the claim-check
//! record, and the wire payloads that cross the queue and callback boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Static config — services.yaml
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One upstream tool-execution service, as declared in `services.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub requires_credentials: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    #[default]
    HttpMcp,
    Stdio,
}

/// A single tool exposed by a [`ServiceDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Opaque JSON Schema describing the tool's parameters.
    #[serde(default = "d_schema")]
    pub input_schema: serde_json::Value,
    #[serde(default = "d_true")]
    pub enabled: bool,
}

fn d_true() -> bool {
    true
}

fn d_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// A namespaced tool name resolved against the services registry (C1 output).
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    pub service_name: String,
    pub tool_name: String,
    pub service: ServiceDefinition,
}

impl ResolvedTool {
    /// The tool definition this call resolved to, looked up by name.
    pub fn tool(&self) -> Option<&ToolDefinition> {
        self.service.tools.iter().find(|t| t.name == self.tool_name)
    }

    /// Re-namespaced name as emitted by `tools/list`: `"<service>.<tool>"`.
    pub fn namespaced(&self) -> String {
        format!("{}.{}", self.service_name, self.tool_name)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Claim-check record (C2)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A parked tool-call body, addressable only by `request_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredContext {
    pub request_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub service: String,
    pub operation: String,
    pub body: BTreeMap<String, serde_json::Value>,
    pub created_at: i64,
}

impl StoredContext {
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.created_at
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue payload (C3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Published to the execution queue. Intentionally omits `body` — the
/// Executor retrieves it from the Context Store via `callback_url`'s sibling
/// context-fetch endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionNotification {
    pub request_id: String,
    pub service: String,
    pub operation: String,
    pub callback_url: String,
    pub tenant_id: String,
    pub user_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Callback payload (C4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Posted by the Executor to `/callback` once the upstream tool has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecuteError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteError {
    pub code: String,
    pub message: String,
}
