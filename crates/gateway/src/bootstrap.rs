//! Wires the five components into a [`GatewayState`] and starts the
//! background tasks (TTL sweeper, queue reconnect loop). Mirrors the
//! teacher's `bootstrap.rs`: one function builds state, a second spawns the
//! periodic tasks, both called once from `main`.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use npg_context::ContextStore;
use npg_domain::config::{RuntimeConfig, ServiceDefinition};
use npg_policy::HttpPolicyClient;
use npg_queue::LapinPublisher;
use npg_rendezvous::Rendezvous;
use npg_router::ToolRouter;

use crate::state::GatewayState;

const RECONNECT_INTERVAL_MS: u64 = 5_000;
const CLEANUP_INTERVAL_SECS: u64 = 60;

/// Build the process-wide component handle. Does not bind the HTTP
/// listener or spawn background tasks — see [`spawn_background_tasks`].
pub fn build_state(
    runtime: RuntimeConfig,
    services: Vec<ServiceDefinition>,
    self_base_url: String,
) -> anyhow::Result<GatewayState> {
    let policy_url = std::env::var("POLICY_SERVICE_URL")
        .unwrap_or_else(|_| "http://localhost:8090".to_string());
    tracing::info!(url = %policy_url, "policy client ready");
    let policy = Arc::new(HttpPolicyClient::new(policy_url));

    let router = Arc::new(ToolRouter::new(services, policy.clone()));

    let context = Arc::new(ContextStore::new(runtime.context_ttl_ms));

    let publisher: Arc<dyn npg_queue::ExecutionPublisher> = Arc::new(LapinPublisher::connect(
        runtime.amqp_uri(),
        runtime.execution_queue.clone(),
        RECONNECT_INTERVAL_MS,
    ));

    let rendezvous = Arc::new(Rendezvous::new());

    let executor_token_hash = match std::env::var("EXECUTOR_TOKEN") {
        Ok(token) if !token.is_empty() => {
            tracing::info!("executor bearer-token auth enabled for /context and /callback");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(
                "EXECUTOR_TOKEN not set — /context and /callback are unauthenticated; \
                 spec.md §6 requires network policy, mTLS, or a bearer token in production"
            );
            None
        }
    };

    Ok(GatewayState {
        runtime: Arc::new(runtime),
        router,
        context,
        publisher,
        rendezvous,
        policy,
        self_base_url,
        executor_token_hash,
        shutdown: Arc::new(tokio::sync::Notify::new()),
    })
}

/// Spawn the periodic TTL sweeper (suggested every 60s, spec.md §4.2). The
/// queue's own reconnect loop is already running inside `LapinPublisher`.
/// Stops when `state.shutdown` is notified.
pub fn spawn_background_tasks(state: &GatewayState) {
    let context = state.context.clone();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = context.cleanup_expired();
                    if removed > 0 {
                        tracing::info!(removed, "context TTL sweep removed expired entries");
                    }
                }
                _ = shutdown.notified() => {
                    tracing::info!("context TTL sweeper stopped");
                    return;
                }
            }
        }
    });
}

/// Load both configuration surfaces from the environment, failing loudly
/// if the services document cannot be read.
pub fn load_config() -> anyhow::Result<(RuntimeConfig, npg_domain::config::ServicesConfig)> {
    let runtime = RuntimeConfig::from_env();
    let services = npg_domain::config::ServicesConfig::load(&runtime.services_config_path)
        .with_context(|| format!("loading services config from {}", runtime.services_config_path))?;
    Ok((runtime, services))
}
