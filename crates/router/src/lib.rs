//! Tool Router (C1) — namespaced tool-name parsing, config+policy
//! resolution, raw-name fallback, and `tools/list` enumeration.

use std::sync::Arc;

use parking_lot::RwLock;

use npg_domain::model::{ResolvedTool, ServiceDefinition, ToolDefinition};
use npg_policy::PolicyClient;

/// Split `"<service>.<tool>"` on the first `.`, rejecting a dot at position
/// 0 or the final position, and rejecting its total absence.
///
/// `parse("a.b") = Some(("a", "b"))`; `parse(".b") = parse("a.") =
/// parse("ab") = None`.
pub fn parse_namespaced(name: &str) -> Option<(&str, &str)> {
    let dot = name.find('.')?;
    if dot == 0 || dot == name.len() - 1 {
        return None;
    }
    Some((&name[..dot], &name[dot + 1..]))
}

/// Resolves namespaced tool calls against a services registry, consulting
/// the Policy service as the enabled-state source of truth and falling
/// back to the YAML `enabled` flag when Policy is unreachable.
pub struct ToolRouter {
    services: RwLock<Vec<ServiceDefinition>>,
    policy: Arc<dyn PolicyClient>,
}

impl ToolRouter {
    pub fn new(services: Vec<ServiceDefinition>, policy: Arc<dyn PolicyClient>) -> Self {
        Self {
            services: RwLock::new(services),
            policy,
        }
    }

    /// Replace the in-memory services list (config reload). Not
    /// hot-reloaded mid-request — callers invoke this between requests.
    pub fn set_services(&self, services: Vec<ServiceDefinition>) {
        *self.services.write() = services;
    }

    pub fn services_snapshot(&self) -> Vec<ServiceDefinition> {
        self.services.read().clone()
    }

    /// Whether `service` is enabled per the source-of-truth split: Policy if
    /// reachable, else the YAML flag. Failing open to YAML is a deliberate
    /// availability choice (spec.md §9) and is logged.
    async fn is_enabled(&self, svc: &ServiceDefinition) -> bool {
        match self.policy.is_service_enabled(&svc.name).await {
            Some(enabled) => enabled,
            None => {
                tracing::warn!(
                    service = %svc.name,
                    yaml_enabled = svc.enabled,
                    "policy service unreachable, falling back to config enabled flag"
                );
                svc.enabled
            }
        }
    }

    /// Resolve a namespaced or raw tool name to a [`ResolvedTool`].
    ///
    /// Namespaced lookup (`"service.tool"`) takes priority; the raw-name
    /// fallback (scan enabled services in config order for a matching tool
    /// name) is only entered when the input has no dot.
    pub async fn resolve(&self, tool_name: &str) -> Option<ResolvedTool> {
        match parse_namespaced(tool_name) {
            Some((service_name, tool)) => self.resolve_namespaced(service_name, tool).await,
            None => self.resolve_raw(tool_name).await,
        }
    }

    async fn resolve_namespaced(&self, service_name: &str, tool_name: &str) -> Option<ResolvedTool> {
        let svc = {
            let services = self.services.read();
            services.iter().find(|s| s.name == service_name).cloned()
        }?;

        if !self.is_enabled(&svc).await {
            return None;
        }

        let resolved = ResolvedTool {
            service_name: svc.name.clone(),
            tool_name: tool_name.to_string(),
            service: svc,
        };
        if !resolved.tool()?.enabled {
            return None;
        }
        Some(resolved)
    }

    async fn resolve_raw(&self, tool_name: &str) -> Option<ResolvedTool> {
        let services = self.services_snapshot();
        for svc in &services {
            if !self.is_enabled(svc).await {
                continue;
            }
            let resolved = ResolvedTool {
                service_name: svc.name.clone(),
                tool_name: tool_name.to_string(),
                service: svc.clone(),
            };
            if resolved.tool().is_some_and(|t| t.enabled) {
                return Some(resolved);
            }
        }
        None
    }

    /// Enumerate enabled services and their enabled tools, for `tools/list`.
    /// Per SPEC_FULL.md's resolution of spec.md's open question, visibility
    /// follows Policy — a service enabled in YAML but disabled in Policy is
    /// excluded.
    pub async fn list_enabled_tools(&self) -> Vec<(String, ToolDefinition)> {
        let services = self.services_snapshot();
        let mut out = Vec::new();
        for svc in &services {
            if !self.is_enabled(svc).await {
                continue;
            }
            for tool in &svc.tools {
                if tool.enabled {
                    out.push((svc.name.clone(), tool.clone()));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use npg_policy::{ApprovalRequest, PolicyDecision};

    struct FakePolicy {
        enabled: parking_lot::Mutex<std::collections::HashMap<String, bool>>,
        reachable: bool,
    }

    impl FakePolicy {
        fn reachable(pairs: &[(&str, bool)]) -> Self {
            Self {
                enabled: parking_lot::Mutex::new(
                    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                ),
                reachable: true,
            }
        }

        fn unreachable() -> Self {
            Self {
                enabled: parking_lot::Mutex::new(std::collections::HashMap::new()),
                reachable: false,
            }
        }
    }

    #[async_trait]
    impl PolicyClient for FakePolicy {
        async fn check(&self, _request: ApprovalRequest) -> PolicyDecision {
            PolicyDecision::Approved
        }

        async fn is_service_enabled(&self, service: &str) -> Option<bool> {
            if !self.reachable {
                return None;
            }
            Some(*self.enabled.lock().get(service).unwrap_or(&false))
        }

        async fn get_enabled_services(&self) -> Option<Vec<String>> {
            if !self.reachable {
                return None;
            }
            Some(
                self.enabled
                    .lock()
                    .iter()
                    .filter(|(_, v)| **v)
                    .map(|(k, _)| k.clone())
                    .collect(),
            )
        }
    }

    fn testservice() -> ServiceDefinition {
        ServiceDefinition {
            name: "testservice".into(),
            display_name: "Test Service".into(),
            service_type: Default::default(),
            endpoint: "http://localhost:9100".into(),
            requires_credentials: false,
            description: String::new(),
            enabled: true,
            tools: vec![
                ToolDefinition {
                    name: "do_thing".into(),
                    description: "does a thing".into(),
                    input_schema: serde_json::json!({}),
                    enabled: true,
                },
                ToolDefinition {
                    name: "disabled_tool".into(),
                    description: "never runs".into(),
                    input_schema: serde_json::json!({}),
                    enabled: false,
                },
            ],
        }
    }

    #[test]
    fn parse_namespaced_cases() {
        assert_eq!(parse_namespaced("a.b"), Some(("a", "b")));
        assert_eq!(parse_namespaced(".b"), None);
        assert_eq!(parse_namespaced("a."), None);
        assert_eq!(parse_namespaced("ab"), None);
        assert_eq!(parse_namespaced("a.b.c"), Some(("a", "b.c")));
    }

    #[tokio::test]
    async fn resolve_namespaced_happy_path() {
        let policy = Arc::new(FakePolicy::reachable(&[("testservice", true)]));
        let router = ToolRouter::new(vec![testservice()], policy);

        let resolved = router.resolve("testservice.do_thing").await.unwrap();
        assert_eq!(resolved.service_name, "testservice");
        assert_eq!(resolved.tool_name, "do_thing");
    }

    #[tokio::test]
    async fn resolve_unknown_tool_is_none() {
        let policy = Arc::new(FakePolicy::reachable(&[("testservice", true)]));
        let router = ToolRouter::new(vec![testservice()], policy);
        assert!(router.resolve("nonexistent.fake").await.is_none());
    }

    #[tokio::test]
    async fn resolve_disabled_tool_is_none() {
        let policy = Arc::new(FakePolicy::reachable(&[("testservice", true)]));
        let router = ToolRouter::new(vec![testservice()], policy);
        assert!(router
            .resolve("testservice.disabled_tool")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn resolve_falls_back_to_yaml_when_policy_unreachable() {
        let policy = Arc::new(FakePolicy::unreachable());
        let router = ToolRouter::new(vec![testservice()], policy);
        // testservice.enabled == true in YAML, so it still resolves.
        assert!(router.resolve("testservice.do_thing").await.is_some());
    }

    #[tokio::test]
    async fn resolve_policy_disabled_overrides_yaml_enabled() {
        let policy = Arc::new(FakePolicy::reachable(&[("testservice", false)]));
        let router = ToolRouter::new(vec![testservice()], policy);
        assert!(router.resolve("testservice.do_thing").await.is_none());
    }

    #[tokio::test]
    async fn raw_name_fallback_scans_enabled_services() {
        let policy = Arc::new(FakePolicy::reachable(&[("testservice", true)]));
        let router = ToolRouter::new(vec![testservice()], policy);
        let resolved = router.resolve("do_thing").await.unwrap();
        assert_eq!(resolved.service_name, "testservice");
    }

    #[tokio::test]
    async fn raw_name_fallback_skips_disabled_tool() {
        let policy = Arc::new(FakePolicy::reachable(&[("testservice", true)]));
        let router = ToolRouter::new(vec![testservice()], policy);
        assert!(router.resolve("disabled_tool").await.is_none());
    }

    #[tokio::test]
    async fn list_enabled_tools_excludes_disabled_and_policy_off() {
        let mut svc2 = testservice();
        svc2.name = "otherservice".into();
        let policy = Arc::new(FakePolicy::reachable(&[
            ("testservice", true),
            ("otherservice", false),
        ]));
        let router = ToolRouter::new(vec![testservice(), svc2], policy);

        let tools = router.list_enabled_tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].0, "testservice");
        assert_eq!(tools[0].1.name, "do_thing");
    }

    #[tokio::test]
    async fn set_services_reload_takes_effect() {
        let policy = Arc::new(FakePolicy::reachable(&[("testservice", true)]));
        let router = ToolRouter::new(vec![], policy);
        assert!(router.resolve("testservice.do_thing").await.is_none());

        router.set_services(vec![testservice()]);
        assert!(router.resolve("testservice.do_thing").await.is_some());
    }
}
