use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation stamped by the admission webhook with the creating user.
pub const OWNER_ANNOTATION: &str = "workspace.jupyter.org/created-by";

/// Label set on every pod that backs a workspace.
pub const WORKSPACE_NAME_LABEL: &str = "workspace.jupyter.org/workspace-name";

/// Describes a user's workspace.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "workspace.jupyter.org",
    version = "v1alpha1",
    kind = "Workspace",
    derive = "PartialEq",
    status = "WorkspaceStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    #[serde(default)]
    pub display_name: String,
    pub image: Option<String>,
    pub desired_status: Option<String>,

    /// Either `Public` or `OwnerOnly`. See [`Workspace::access_type`].
    pub access_type: Option<String>,

    pub access_strategy: Option<AccessStrategyRef>,
    pub template_ref: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStatus {
    pub deployment_name: Option<String>,
    pub service_name: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// References a `WorkspaceAccessStrategy`, possibly in another namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessStrategyRef {
    pub name: String,
    pub namespace: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessType {
    Public,
    OwnerOnly,
}

// === impl Workspace ===

impl Workspace {
    /// The workspace's access type.
    ///
    /// Only an explicit `Public` opens a workspace up. An unset value, the
    /// legacy `Private` spelling and anything unrecognized are all treated as
    /// `OwnerOnly`.
    pub fn access_type(&self) -> AccessType {
        match self.spec.access_type.as_deref() {
            Some(v) if v.eq_ignore_ascii_case("public") => AccessType::Public,
            _ => AccessType::OwnerOnly,
        }
    }

    /// The creating user, if the owner annotation is set and non-empty.
    pub fn owner(&self) -> Option<&str> {
        self.annotations()
            .get(OWNER_ANNOTATION)
            .map(String::as_str)
            .filter(|owner| !owner.is_empty())
    }
}

// === impl AccessStrategyRef ===

impl AccessStrategyRef {
    /// The referenced strategy's namespace, defaulting to the referrer's.
    pub fn namespace_or<'a>(&'a self, default_ns: &'a str) -> &'a str {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_ns)
    }
}

// === impl AccessType ===

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => "Public".fmt(f),
            Self::OwnerOnly => "OwnerOnly".fmt(f),
        }
    }
}
