use crate::{
    authz::{AuthorizeSubject, PermissionChecker},
    store::ResourceStore,
    subject::Subject,
    template::TemplateError,
    vscode::{self, StartSession},
    web_ui::{self, SignToken},
};
use std::{str::FromStr, sync::Arc};
use workspace_connection_k8s_api::Workspace;

/// The kinds of connection a workspace can be opened with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    VscodeRemote,
    WebUi,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid workspaceConnectionType: '{0}'. Valid types are: 'vscode-remote', 'web-ui'")]
pub struct InvalidConnectionType(String);

/// The backends a connection is synthesized against.
#[derive(Clone)]
pub struct Backends {
    pub authz: Arc<dyn AuthorizeSubject>,
    pub store: Arc<dyn ResourceStore>,
    pub tunnel: Arc<dyn StartSession>,
    pub signer: Arc<dyn SignToken>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Identifies the cluster to remote IDE clients.
    pub cluster_id: Option<String>,
}

/// Reasons a connection URL could not be produced.
///
/// Backend failures render a generic message; their source chain is only
/// meant for logs.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionUrlError {
    #[error("cluster identifier is not configured")]
    MissingClusterId,

    #[error("no pod found for workspace {0}")]
    NoPod(String),

    #[error("no AccessStrategy configured for workspace")]
    NoAccessStrategy,

    #[error("AccessStrategy {namespace}/{name} not found")]
    AccessStrategyNotFound { namespace: String, name: String },

    #[error("BearerAuthURLTemplate not configured in AccessStrategy")]
    NoBearerTemplate,

    #[error("failed to render bearer auth URL: {0}")]
    Template(#[from] TemplateError),

    #[error("invalid connection URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("connection URL has no host")]
    MissingHost,

    #[error("failed to start remote session")]
    Tunnel(#[source] anyhow::Error),

    #[error("failed to sign token")]
    Signer(#[source] anyhow::Error),

    #[error("failed to read workspace resources")]
    Store(#[source] anyhow::Error),
}

// === impl ConnectionType ===

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VscodeRemote => "vscode-remote",
            Self::WebUi => "web-ui",
        }
    }

    /// Whether the cluster identifier must be configured to serve this type.
    pub fn requires_cluster_id(&self) -> bool {
        matches!(self, Self::VscodeRemote)
    }

    /// Produces the connection endpoint for an authorized subject.
    pub async fn connection_url(
        self,
        workspace: &Workspace,
        subject: &Subject,
        backends: &Backends,
        config: &ConnectionConfig,
    ) -> Result<String, ConnectionUrlError> {
        match self {
            Self::VscodeRemote => vscode::connection_url(workspace, backends, config).await,
            Self::WebUi => web_ui::connection_url(workspace, subject, backends).await,
        }
    }
}

impl FromStr for ConnectionType {
    type Err = InvalidConnectionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vscode-remote" => Ok(Self::VscodeRemote),
            "web-ui" => Ok(Self::WebUi),
            other => Err(InvalidConnectionType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl Backends ===

impl Backends {
    pub fn permission_checker(&self) -> PermissionChecker {
        PermissionChecker::new(self.authz.clone(), self.store.clone())
    }
}

// === impl ConnectionUrlError ===

impl ConnectionUrlError {
    /// True when the failure came from a backend rather than from the
    /// workspace's configuration.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Tunnel(_) | Self::Signer(_) | Self::Store(_))
    }
}
