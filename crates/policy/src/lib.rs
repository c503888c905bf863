//! Client for the external Policy service (spec.md §6): the decision point
//! that approves/denies tool calls and is the runtime source of truth for
//! whether a service is enabled.
//!
//! This crate pins the *interface* only — the Policy service itself is an
//! external collaborator out of scope for this repo (spec.md §1).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The result of an approval check against the Policy service.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    Approved,
    Denied { reason: String },
    Unavailable,
}

/// The request sent to the Policy service's approval endpoint.
///
/// `argument_keys` is the redacted "summary-of-arguments" spec.md §4.5 step
/// 3 calls for — key names only, never values (see SPEC_FULL.md §5.3).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub tenant_id: String,
    pub user_id: String,
    pub service: String,
    pub operation: String,
    pub argument_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApprovalResponseBody {
    approved: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnabledResponseBody {
    enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct EnabledServicesResponseBody {
    services: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The Policy service's three operations, per spec.md §6. All three must be
/// idempotent and cheap; `unreachable` collapses any transport failure so
/// callers don't need to know about HTTP/timeout/connect-refused distinctions.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    async fn check(&self, request: ApprovalRequest) -> PolicyDecision;

    /// Returns `None` if the Policy service is unreachable — the router
    /// falls back to the YAML `enabled` flag in that case (spec.md §4.1).
    async fn is_service_enabled(&self, service: &str) -> Option<bool>;

    /// Returns `None` if unreachable.
    async fn get_enabled_services(&self) -> Option<Vec<String>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpPolicyClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPolicyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client builder with fixed config cannot fail");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl PolicyClient for HttpPolicyClient {
    async fn check(&self, request: ApprovalRequest) -> PolicyDecision {
        let url = format!("{}/v1/approve", self.base_url);
        let resp = self.client.post(&url).json(&request).send().await;

        match resp {
            Ok(r) if r.status().is_success() => match r.json::<ApprovalResponseBody>().await {
                Ok(body) if body.approved => PolicyDecision::Approved,
                Ok(body) => PolicyDecision::Denied {
                    reason: body.reason.unwrap_or_else(|| "denied by policy".into()),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "policy approval response malformed");
                    PolicyDecision::Unavailable
                }
            },
            Ok(r) => {
                tracing::warn!(status = %r.status(), "policy service returned non-success");
                PolicyDecision::Unavailable
            }
            Err(e) => {
                tracing::warn!(error = %e, "policy service unreachable");
                PolicyDecision::Unavailable
            }
        }
    }

    async fn is_service_enabled(&self, service: &str) -> Option<bool> {
        let url = format!("{}/v1/services/{service}/enabled", self.base_url);
        match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => match r.json::<EnabledResponseBody>().await {
                Ok(body) => Some(body.enabled),
                Err(e) => {
                    tracing::warn!(error = %e, service, "policy enabled-check response malformed");
                    None
                }
            },
            Ok(r) => {
                tracing::warn!(status = %r.status(), service, "policy enabled-check non-success");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, service, "policy service unreachable for enabled-check");
                None
            }
        }
    }

    async fn get_enabled_services(&self) -> Option<Vec<String>> {
        let url = format!("{}/v1/services/enabled", self.base_url);
        match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => {
                match r.json::<EnabledServicesResponseBody>().await {
                    Ok(body) => Some(body.services),
                    Err(e) => {
                        tracing::warn!(error = %e, "policy enabled-services response malformed");
                        None
                    }
                }
            }
            Ok(r) => {
                tracing::warn!(status = %r.status(), "policy enabled-services non-success");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "policy service unreachable for enabled-services");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn check_approved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/approve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "approved": true
            })))
            .mount(&server)
            .await;

        let client = HttpPolicyClient::new(server.uri());
        let decision = client
            .check(ApprovalRequest {
                tenant_id: "t1".into(),
                user_id: "u1".into(),
                service: "testservice".into(),
                operation: "do_thing".into(),
                argument_keys: vec!["query".into()],
            })
            .await;
        assert_eq!(decision, PolicyDecision::Approved);
    }

    #[tokio::test]
    async fn check_denied_carries_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/approve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "approved": false,
                "reason": "over quota"
            })))
            .mount(&server)
            .await;

        let client = HttpPolicyClient::new(server.uri());
        let decision = client
            .check(ApprovalRequest {
                tenant_id: "t1".into(),
                user_id: "u1".into(),
                service: "testservice".into(),
                operation: "do_thing".into(),
                argument_keys: vec![],
            })
            .await;
        assert_eq!(
            decision,
            PolicyDecision::Denied {
                reason: "over quota".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_server_yields_unavailable() {
        let client = HttpPolicyClient::new("http://127.0.0.1:1");
        let decision = client
            .check(ApprovalRequest {
                tenant_id: "t1".into(),
                user_id: "u1".into(),
                service: "testservice".into(),
                operation: "do_thing".into(),
                argument_keys: vec![],
            })
            .await;
        assert_eq!(decision, PolicyDecision::Unavailable);
    }

    #[tokio::test]
    async fn is_service_enabled_reflects_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/services/testservice/enabled"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "enabled": false
            })))
            .mount(&server)
            .await;

        let client = HttpPolicyClient::new(server.uri());
        assert_eq!(client.is_service_enabled("testservice").await, Some(false));
    }

    #[tokio::test]
    async fn is_service_enabled_none_when_unreachable() {
        let client = HttpPolicyClient::new("http://127.0.0.1:1");
        assert_eq!(client.is_service_enabled("testservice").await, None);
    }
}
