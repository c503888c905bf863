//! Runtime environment configuration — spec.md §6's nine environment
//! variables, parsed once at startup with the defaults the spec states.

use serde::{Deserialize, Serialize};

/// Parsed runtime configuration. Every field has a spec-mandated default, so
/// `RuntimeConfig::from_env()` never fails — it just logs what it assumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "d_rabbitmq_host")]
    pub rabbitmq_host: String,
    #[serde(default = "d_rabbitmq_port")]
    pub rabbitmq_port: u16,
    #[serde(default = "d_rabbitmq_user")]
    pub rabbitmq_user: String,
    #[serde(default = "d_rabbitmq_pass")]
    pub rabbitmq_pass: String,
    #[serde(default = "d_execution_queue")]
    pub execution_queue: String,
    #[serde(default = "d_context_ttl_ms")]
    pub context_ttl_ms: u64,
    #[serde(default = "d_services_config_path")]
    pub services_config_path: String,
    #[serde(default = "d_credential_proxy_url")]
    pub credential_proxy_url: String,
    #[serde(default = "d_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
    /// Upper bound on how long graceful shutdown waits for in-flight
    /// mediator tasks to drain before the process exits anyway (spec.md §5).
    /// Not one of spec.md §6's nine named variables — an operational knob
    /// this implementation adds, defaulting generously so a drain timeout
    /// never fires under normal load.
    #[serde(default = "d_shutdown_drain_ms")]
    pub shutdown_drain_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rabbitmq_host: d_rabbitmq_host(),
            rabbitmq_port: d_rabbitmq_port(),
            rabbitmq_user: d_rabbitmq_user(),
            rabbitmq_pass: d_rabbitmq_pass(),
            execution_queue: d_execution_queue(),
            context_ttl_ms: d_context_ttl_ms(),
            services_config_path: d_services_config_path(),
            credential_proxy_url: d_credential_proxy_url(),
            execution_timeout_ms: d_execution_timeout_ms(),
            shutdown_drain_ms: d_shutdown_drain_ms(),
        }
    }
}

impl RuntimeConfig {
    /// Read the nine environment variables spec.md §6 lists, falling back to
    /// defaults for anything unset or unparsable. Unparsable numeric values
    /// are logged at `warn` and the default is kept rather than failing
    /// startup.
    pub fn from_env() -> Self {
        Self {
            rabbitmq_host: env_or("RABBITMQ_HOST", d_rabbitmq_host()),
            rabbitmq_port: env_parsed_or("RABBITMQ_PORT", d_rabbitmq_port()),
            rabbitmq_user: env_or("RABBITMQ_USER", d_rabbitmq_user()),
            rabbitmq_pass: env_or("RABBITMQ_PASS", d_rabbitmq_pass()),
            execution_queue: env_or("EXECUTION_QUEUE", d_execution_queue()),
            context_ttl_ms: env_parsed_or("CONTEXT_TTL_MS", d_context_ttl_ms()),
            services_config_path: env_or("SERVICES_CONFIG_PATH", d_services_config_path()),
            credential_proxy_url: env_or("CREDENTIAL_PROXY_URL", d_credential_proxy_url()),
            execution_timeout_ms: env_parsed_or("EXECUTION_TIMEOUT_MS", d_execution_timeout_ms()),
            shutdown_drain_ms: env_parsed_or("SHUTDOWN_DRAIN_MS", d_shutdown_drain_ms()),
        }
    }

    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/%2f",
            self.rabbitmq_user, self.rabbitmq_pass, self.rabbitmq_host, self.rabbitmq_port
        )
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "invalid value for env var, using default");
            default
        }),
        _ => default,
    }
}

// ── serde default helpers (mirror the env-var defaults) ─────────────

fn d_rabbitmq_host() -> String {
    "localhost".into()
}
fn d_rabbitmq_port() -> u16 {
    5672
}
fn d_rabbitmq_user() -> String {
    "guest".into()
}
fn d_rabbitmq_pass() -> String {
    "guest".into()
}
fn d_execution_queue() -> String {
    "npl.execution.requests".into()
}
fn d_context_ttl_ms() -> u64 {
    300_000
}
fn d_services_config_path() -> String {
    "services.yaml".into()
}
fn d_credential_proxy_url() -> String {
    "http://localhost:8085".into()
}
fn d_execution_timeout_ms() -> u64 {
    120_000
}
fn d_shutdown_drain_ms() -> u64 {
    30_000
}
