use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes how workspaces are reached from outside the cluster.
///
/// Only `bearer_auth_url_template` is read when creating connections; the
/// resource and environment templates are consumed by the workspace
/// reconciler.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "workspace.jupyter.org",
    version = "v1alpha1",
    kind = "WorkspaceAccessStrategy",
    derive = "PartialEq",
    status = "WorkspaceAccessStrategyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceAccessStrategySpec {
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub access_resource_templates: Vec<AccessResourceTemplate>,

    #[serde(rename = "accessURLTemplate")]
    pub access_url_template: Option<String>,

    #[serde(rename = "bearerAuthURLTemplate")]
    pub bearer_auth_url_template: Option<String>,

    pub create_connection_handler: Option<String>,
    pub create_connection_context: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessResourceTemplate {
    pub kind: String,
    pub api_version: String,
    pub name_prefix: String,
    pub template: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct WorkspaceAccessStrategyStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// === impl WorkspaceAccessStrategy ===

impl WorkspaceAccessStrategy {
    /// The bearer-auth URL template, if one is configured and non-empty.
    pub fn bearer_auth_url_template(&self) -> Option<&str> {
        self.spec
            .bearer_auth_url_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_style_field_names() {
        let strategy: WorkspaceAccessStrategy = serde_json::from_value(serde_json::json!({
            "apiVersion": "workspace.jupyter.org/v1alpha1",
            "kind": "WorkspaceAccessStrategy",
            "metadata": { "name": "web", "namespace": "ns-0" },
            "spec": {
                "displayName": "Web",
                "accessResourceTemplates": [],
                "accessURLTemplate": "https://example.com/{{.Workspace.Name}}/",
                "bearerAuthURLTemplate": "https://example.com/{{.Workspace.Name}}/bearer-auth"
            }
        }))
        .expect("access strategy must parse");
        assert_eq!(
            strategy.bearer_auth_url_template(),
            Some("https://example.com/{{.Workspace.Name}}/bearer-auth")
        );
    }

    #[test]
    fn blank_template_is_absent() {
        let strategy: WorkspaceAccessStrategy = serde_json::from_value(serde_json::json!({
            "apiVersion": "workspace.jupyter.org/v1alpha1",
            "kind": "WorkspaceAccessStrategy",
            "metadata": { "name": "web", "namespace": "ns-0" },
            "spec": { "bearerAuthURLTemplate": "  " }
        }))
        .expect("access strategy must parse");
        assert_eq!(strategy.bearer_auth_url_template(), None);
    }
}
