//! Wire types served by the connection API group.
//!
//! These are not stored resources: they only exist for the lifetime of one
//! request and are never persisted.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GROUP: &str = "connection.workspace.jupyter.org";
pub const VERSION: &str = "v1alpha1";
pub const API_VERSION: &str = "connection.workspace.jupyter.org/v1alpha1";

pub const WORKSPACE_CONNECTION_KIND: &str = "WorkspaceConnection";
pub const CONNECTION_ACCESS_REVIEW_KIND: &str = "ConnectionAccessReview";

/// The resource name role bindings are written against.
pub const WORKSPACE_CONNECTIONS_RESOURCE: &str = "workspaceconnections";
pub const CONNECTION_ACCESS_REVIEWS_RESOURCE: &str = "connectionaccessreviews";

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConnectionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkspaceConnectionRequestSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConnectionRequestSpec {
    #[serde(default)]
    pub workspace_name: String,
    #[serde(default)]
    pub workspace_connection_type: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConnectionResponse {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: WorkspaceConnectionRequestSpec,
    pub status: WorkspaceConnectionResponseStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConnectionResponseStatus {
    pub workspace_connection_type: String,
    pub workspace_connection_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAccessReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ConnectionAccessReviewSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConnectionAccessReviewStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAccessReviewSpec {
    #[serde(default)]
    pub workspace_name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAccessReviewStatus {
    pub allowed: bool,
    pub not_found: bool,
    pub reason: String,
}

/// A Kubernetes `Status` failure body.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub kind: String,
    pub api_version: String,
    pub status: String,
    pub message: String,
    pub code: u16,
}

// === impl Status ===

impl Status {
    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: "Status".to_string(),
            api_version: "v1".to_string(),
            status: "Failure".to_string(),
            message: message.into(),
            code,
        }
    }
}
