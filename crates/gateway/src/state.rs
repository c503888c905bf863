//! Shared application state (spec.md §9: "implement as an explicit `Server`
//! handle constructed at start-up and passed by reference to all handlers;
//! avoid hidden global state").

use std::sync::Arc;

use npg_context::ContextStore;
use npg_domain::config::RuntimeConfig;
use npg_policy::PolicyClient;
use npg_queue::ExecutionPublisher;
use npg_rendezvous::Rendezvous;
use npg_router::ToolRouter;

/// The five core components (C1–C4, plus the config they were built from)
/// wired together and passed to every API handler. `Clone` is cheap — every
/// field is an `Arc`.
#[derive(Clone)]
pub struct GatewayState {
    pub runtime: Arc<RuntimeConfig>,
    pub router: Arc<ToolRouter>,
    pub context: Arc<ContextStore>,
    pub publisher: Arc<dyn ExecutionPublisher>,
    pub rendezvous: Arc<Rendezvous>,
    pub policy: Arc<dyn PolicyClient>,
    /// Base URL this gateway is reachable at, used to build the
    /// `callback_url` field of each `ExecutionNotification`.
    pub self_base_url: String,
    /// SHA-256 digest of the Executor bearer token, if configured. `None`
    /// means the context-fetch and callback endpoints are unauthenticated
    /// (dev mode) — logged loudly at startup.
    pub executor_token_hash: Option<Vec<u8>>,
    /// Signalled to stop background tasks (TTL sweeper) during graceful
    /// shutdown; paired with `axum::serve`'s `with_graceful_shutdown`.
    pub shutdown: Arc<tokio::sync::Notify>,
}

impl GatewayState {
    /// The callback endpoint the Executor posts `ExecuteResult` to. The
    /// body carries `requestId`, so the URL itself needs no path parameter.
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.self_base_url.trim_end_matches('/'))
    }
}
