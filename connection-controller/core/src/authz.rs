//! Decides whether a subject may open a connection to a workspace.
//!
//! A decision is reached in two stages. The subject must first hold the role
//! permission to create `workspaceconnections` in the namespace; only then is
//! the workspace read and its access type consulted. A role denial never
//! touches the resource store.

use crate::{store::ResourceStore, subject::Subject};
use anyhow::Result;
use std::sync::Arc;
use workspace_connection_k8s_api::{
    connection::{ConnectionAccessReviewStatus, GROUP, WORKSPACE_CONNECTIONS_RESOURCE},
    AccessType, Workspace,
};

pub const CONNECTION_VERB: &str = "create";

/// A role-based access question posed to the authorization backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessCheck<'a> {
    pub namespace: &'a str,
    pub verb: &'static str,
    pub group: &'static str,
    pub resource: &'static str,
    pub subject: &'a Subject,
}

#[async_trait::async_trait]
pub trait AuthorizeSubject: Send + Sync {
    /// Returns true if the subject holds the requested permission.
    ///
    /// Errors are never treated as a denial by callers; they fail the request.
    async fn check_access(&self, check: &AccessCheck<'_>) -> Result<bool>;
}

/// The outcome of a permission check.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    RoleDenied,
    WorkspaceNotFound,
    Public,
    Owner,
    NotOwner,
}

/// A decision along with the workspace it was made against.
#[derive(Clone, Debug)]
pub struct Permission {
    pub decision: Decision,
    pub workspace: Option<Workspace>,
}

#[derive(Clone)]
pub struct PermissionChecker {
    authz: Arc<dyn AuthorizeSubject>,
    store: Arc<dyn ResourceStore>,
}

// === impl AccessCheck ===

impl<'a> AccessCheck<'a> {
    pub fn create_connection(namespace: &'a str, subject: &'a Subject) -> Self {
        Self {
            namespace,
            verb: CONNECTION_VERB,
            group: GROUP,
            resource: WORKSPACE_CONNECTIONS_RESOURCE,
            subject,
        }
    }
}

// === impl Decision ===

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Public | Self::Owner)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WorkspaceNotFound)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::RoleDenied => "RBAC permission denied",
            Self::WorkspaceNotFound => "Workspace not found",
            Self::Public => "Valid RBAC and the subject Workspace is public",
            Self::Owner => "Valid RBAC and user is the owner of the private Workspace",
            Self::NotOwner => "User is not the owner of the private Workspace",
        }
    }

    /// A short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleDenied => "role_denied",
            Self::WorkspaceNotFound => "not_found",
            Self::Public => "public",
            Self::Owner => "owner",
            Self::NotOwner => "not_owner",
        }
    }

    fn for_workspace(workspace: &Workspace, subject: &Subject) -> Self {
        match workspace.access_type() {
            AccessType::Public => Self::Public,
            AccessType::OwnerOnly => match workspace.owner() {
                Some(owner) if owner == subject.username => Self::Owner,
                _ => Self::NotOwner,
            },
        }
    }
}

impl From<Decision> for ConnectionAccessReviewStatus {
    fn from(decision: Decision) -> Self {
        Self {
            allowed: decision.is_allowed(),
            not_found: decision.is_not_found(),
            reason: decision.reason().to_string(),
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl PermissionChecker ===

impl PermissionChecker {
    pub fn new(authz: Arc<dyn AuthorizeSubject>, store: Arc<dyn ResourceStore>) -> Self {
        Self { authz, store }
    }

    pub async fn check(
        &self,
        namespace: &str,
        workspace: &str,
        subject: &Subject,
    ) -> Result<Permission> {
        let check = AccessCheck::create_connection(namespace, subject);
        if !self.authz.check_access(&check).await? {
            tracing::debug!(%namespace, %workspace, user = %subject.username, "Role check denied");
            return Ok(Permission {
                decision: Decision::RoleDenied,
                workspace: None,
            });
        }

        let Some(ws) = self.store.get_workspace(namespace, workspace).await? else {
            return Ok(Permission {
                decision: Decision::WorkspaceNotFound,
                workspace: None,
            });
        };

        let decision = Decision::for_workspace(&ws, subject);
        tracing::debug!(
            %namespace,
            %workspace,
            user = %subject.username,
            access_type = %ws.access_type(),
            %decision,
        );
        Ok(Permission {
            decision,
            workspace: Some(ws),
        })
    }
}
