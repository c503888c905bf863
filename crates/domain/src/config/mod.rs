mod runtime;
mod services;

pub use runtime::*;
pub use services::*;

use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

/// Validate a loaded services registry, following the teacher's
/// warning-vs-error split: a service with no tools or a duplicate name is a
/// `Warning` (loaded, but flagged); a service missing a required field is an
/// `Error` (refuses to start).
pub fn validate_services(services: &[ServiceDefinition]) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (i, svc) in services.iter().enumerate() {
        if svc.name.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: format!("services[{i}].name"),
                message: "service name must not be empty".into(),
            });
            continue;
        }
        if !seen.insert(svc.name.clone()) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: format!("services[{i}].name"),
                message: format!("duplicate service name \"{}\"", svc.name),
            });
        }
        if svc.enabled && svc.endpoint.is_empty() && svc.service_type == super::model::ServiceType::HttpMcp {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: format!("services[{i}].endpoint"),
                message: format!(
                    "service \"{}\" is enabled and http-mcp but has no endpoint",
                    svc.name
                ),
            });
        }
        if svc.tools.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: format!("services[{i}].tools"),
                message: format!("service \"{}\" declares no tools", svc.name),
            });
        }
        for (j, tool) in svc.tools.iter().enumerate() {
            if tool.name.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("services[{i}].tools[{j}].name"),
                    message: "tool name must not be empty".into(),
                });
            }
        }
    }

    issues
}
