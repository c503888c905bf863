//! Request Mediator (C5) — the end-to-end orchestrator for a single tool
//! call: router → policy check → context store → publish → rendezvous →
//! respond. spec.md §4.5's seven-step state machine.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use npg_domain::error::ErrorCode;
use npg_domain::jsonrpc::JsonRpcResponse;
use npg_domain::model::{ExecuteError, ExecuteResult, ExecutionNotification, StoredContext};
use npg_policy::{ApprovalRequest, PolicyDecision};
use npg_rendezvous::Outcome;

use crate::state::GatewayState;

/// Caller identity threaded through the mediator, not represented on the
/// wire by the JSON-RPC envelope itself — it comes from the HTTP request
/// (headers, in this implementation; see `api::rpc`).
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub tenant_id: String,
    pub user_id: String,
}

/// Guarantees spec.md §5's cancellation contract: if the agent's HTTP
/// connection drops, axum drops this future mid-`.await`, which runs no
/// further code in `handle_tool_call` — only `Drop` impls fire. Without this
/// guard a cancelled call would leak its rendezvous slot and context entry
/// forever, since `Rendezvous::await_execution`'s own cleanup only runs on
/// its *own* completion paths (timeout/error/delivery), not on cancellation
/// of its caller. `disarm()` is called once the mediator has produced its
/// response through a normal path, after which ordinary step-7 cleanup owns
/// the entry.
struct CancellationGuard<'a> {
    context: &'a npg_context::ContextStore,
    rendezvous: &'a npg_rendezvous::Rendezvous,
    request_id: &'a str,
    armed: bool,
}

impl<'a> CancellationGuard<'a> {
    fn new(state: &'a GatewayState, request_id: &'a str) -> Self {
        Self {
            context: &state.context,
            rendezvous: &state.rendezvous,
            request_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancellationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                request_id = %self.request_id,
                "mediator task cancelled (client disconnect) — cleaning up context and rendezvous entries"
            );
            self.rendezvous.cancel(self.request_id);
            self.context.remove(self.request_id);
        }
    }
}

/// Step 1–7 of `handleToolCall`. Always produces a JSON-RPC response — no
/// path here is allowed to leave the agent hanging past the timeout.
pub async fn handle_tool_call(
    state: &GatewayState,
    id: Value,
    namespaced_tool: &str,
    arguments: Value,
    caller: &CallerContext,
) -> JsonRpcResponse {
    // Step 1: resolve.
    let Some(resolved) = state.router.resolve(namespaced_tool).await else {
        tracing::info!(tool = namespaced_tool, "tool resolution failed");
        return JsonRpcResponse::tool_error(
            id,
            ErrorCode::ToolNotFound,
            format!("tool \"{namespaced_tool}\" not found"),
        );
    };

    // Step 2: generate requestId.
    let request_id = Uuid::new_v4().to_string();

    // Step 3: policy check (external).
    let argument_keys = match &arguments {
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };
    let decision = state
        .policy
        .check(ApprovalRequest {
            tenant_id: caller.tenant_id.clone(),
            user_id: caller.user_id.clone(),
            service: resolved.service_name.clone(),
            operation: resolved.tool_name.clone(),
            argument_keys,
        })
        .await;
    tracing::info!(
        request_id = %request_id,
        service = %resolved.service_name,
        operation = %resolved.tool_name,
        tenant_id = %caller.tenant_id,
        decision = ?decision,
        "policy decision"
    );
    match decision {
        PolicyDecision::Approved => {}
        PolicyDecision::Denied { reason } => {
            return JsonRpcResponse::tool_error(id, ErrorCode::PolicyDenied, reason);
        }
        PolicyDecision::Unavailable => {
            return JsonRpcResponse::tool_error(
                id,
                ErrorCode::PolicyUnavailable,
                "policy service unavailable",
            );
        }
    }

    // Step 4: store context.
    let body = match &arguments {
        Value::Object(map) => map.clone().into_iter().collect::<BTreeMap<String, Value>>(),
        other => BTreeMap::from([("arguments".to_string(), other.clone())]),
    };
    state.context.store(StoredContext {
        request_id: request_id.clone(),
        tenant_id: caller.tenant_id.clone(),
        user_id: caller.user_id.clone(),
        service: resolved.service_name.clone(),
        operation: resolved.tool_name.clone(),
        body,
        created_at: Utc::now().timestamp_millis(),
    });
    let mut cancellation_guard = CancellationGuard::new(state, &request_id);

    // Step 5: rendezvous, triggering the publish.
    let notification = ExecutionNotification {
        request_id: request_id.clone(),
        service: resolved.service_name.clone(),
        operation: resolved.tool_name.clone(),
        callback_url: state.callback_url(),
        tenant_id: caller.tenant_id.clone(),
        user_id: caller.user_id.clone(),
    };
    let publisher = state.publisher.clone();
    let outcome = state
        .rendezvous
        .await_execution(&request_id, state.runtime.execution_timeout_ms, || async move {
            if publisher.publish(&notification).await {
                Ok(())
            } else {
                Err("execution queue publish failed".to_string())
            }
        })
        .await;

    // Step 6: outcome translation.
    let response = match outcome {
        Outcome::Success(result) => translate_result(id.clone(), result),
        Outcome::Timeout { timeout_ms, .. } => {
            state.context.remove(&request_id);
            JsonRpcResponse::tool_error(
                id,
                ErrorCode::ExecutionTimeout,
                format!("no callback received within {timeout_ms}ms"),
            )
        }
        Outcome::Error(msg) => {
            state.context.remove(&request_id);
            let code = if msg.contains("publish failed") {
                ErrorCode::ExecutorUnavailable
            } else {
                ErrorCode::InternalError
            };
            JsonRpcResponse::tool_error(id, code, msg)
        }
    };

    // Step 7: cleanup. The Executor already consumed the context on the
    // success path; free the slot unconditionally (idempotent). The mediator
    // is past every cancellable await now, so disarm the cancellation guard
    // first — otherwise it would race this very cleanup on unwind.
    cancellation_guard.disarm();
    state.context.remove(&request_id);

    response
}

fn translate_result(id: Value, result: ExecuteResult) -> JsonRpcResponse {
    if result.success {
        JsonRpcResponse::tool_success(id, result.output.unwrap_or(Value::Null))
    } else {
        let ExecuteError { code, message } = result
            .error
            .unwrap_or_else(|| ExecuteError {
                code: ErrorCode::ExecutionFailed.as_str().to_string(),
                message: "execution failed with no details".to_string(),
            });
        JsonRpcResponse::tool_error(id, ErrorCode::ExecutionFailed, format!("[{code}] {message}"))
    }
}

/// `tools/list` — a direct read through C1: enumerate enabled services and
/// their enabled tools, re-namespaced, emitted as a JSON-RPC success.
pub async fn list_tools(state: &GatewayState, id: Value) -> JsonRpcResponse {
    let tools: Vec<Value> = state
        .router
        .list_enabled_tools()
        .await
        .into_iter()
        .map(|(service_name, tool)| {
            serde_json::json!({
                "name": format!("{service_name}.{}", tool.name),
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use npg_domain::model::{ServiceDefinition, ServiceType, ToolDefinition};
    use npg_policy::{ApprovalRequest, PolicyClient};
    use npg_queue::ExecutionPublisher;

    struct AlwaysApprove;

    #[async_trait]
    impl PolicyClient for AlwaysApprove {
        async fn check(&self, _request: ApprovalRequest) -> PolicyDecision {
            PolicyDecision::Approved
        }
        async fn is_service_enabled(&self, _service: &str) -> Option<bool> {
            Some(true)
        }
        async fn get_enabled_services(&self) -> Option<Vec<String>> {
            Some(vec!["testservice".to_string()])
        }
    }

    /// A publisher that reports success but whose Executor never calls back
    /// — used to keep `handle_tool_call` parked in its rendezvous await long
    /// enough to cancel the enclosing task mid-flight.
    struct SilentPublisher;

    #[async_trait]
    impl ExecutionPublisher for SilentPublisher {
        async fn publish(&self, _notification: &ExecutionNotification) -> bool {
            true
        }
    }

    fn testservice() -> ServiceDefinition {
        ServiceDefinition {
            name: "testservice".into(),
            display_name: "Test Service".into(),
            service_type: ServiceType::HttpMcp,
            endpoint: "http://localhost:9100".into(),
            requires_credentials: false,
            description: String::new(),
            enabled: true,
            tools: vec![ToolDefinition {
                name: "do_thing".into(),
                description: String::new(),
                input_schema: serde_json::json!({}),
                enabled: true,
            }],
        }
    }

    fn test_state() -> GatewayState {
        let policy: std::sync::Arc<dyn PolicyClient> = std::sync::Arc::new(AlwaysApprove);
        GatewayState {
            runtime: std::sync::Arc::new(npg_domain::config::RuntimeConfig {
                execution_timeout_ms: 60_000,
                ..Default::default()
            }),
            router: std::sync::Arc::new(npg_router::ToolRouter::new(vec![testservice()], policy.clone())),
            context: std::sync::Arc::new(npg_context::ContextStore::new(300_000)),
            publisher: std::sync::Arc::new(SilentPublisher),
            rendezvous: std::sync::Arc::new(npg_rendezvous::Rendezvous::new()),
            policy,
            self_base_url: "http://gateway.test".into(),
            executor_token_hash: None,
            shutdown: std::sync::Arc::new(tokio::sync::Notify::new()),
        }
    }

    #[tokio::test]
    async fn cancelled_task_cleans_up_context_and_rendezvous() {
        let state = test_state();
        let context = state.context.clone();
        let rendezvous = state.rendezvous.clone();

        // handle_tool_call needs `&GatewayState` with a 'static lifetime to
        // live inside a spawned task; leak a clone for the test's duration.
        let state: &'static GatewayState = Box::leak(Box::new(state));
        let caller = CallerContext {
            tenant_id: "t1".into(),
            user_id: "u1".into(),
        };

        let task = tokio::spawn(async move {
            handle_tool_call(
                state,
                Value::from(1),
                "testservice.do_thing",
                serde_json::json!({ "query": "hello" }),
                &caller,
            )
            .await
        });

        // Give the task time to pass step 4 (context stored) and start its
        // rendezvous await, then cancel it as if the client had disconnected.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;

        assert_eq!(context.count(), 0, "cancellation must remove the context entry");
        assert_eq!(
            rendezvous.pending_count(),
            0,
            "cancellation must remove the rendezvous slot"
        );
    }
}
