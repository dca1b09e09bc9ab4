//! Remote IDE connections tunneled through a managed session broker.

use crate::connection::{Backends, ConnectionConfig, ConnectionUrlError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;
use workspace_connection_k8s_api::{ResourceExt, Workspace};

pub const VSCODE_SCHEME: &str = "vscode://amazonwebservices.aws-toolkit-vscode/connect/sagemaker";

/// A started remote session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub token_value: String,
    pub stream_url: String,
}

#[async_trait::async_trait]
pub trait StartSession: Send + Sync {
    /// Starts a managed session to the target, identified by its pod UID.
    async fn start_session(&self, target_id: &str) -> Result<SessionInfo>;
}

pub(crate) async fn connection_url(
    workspace: &Workspace,
    backends: &Backends,
    config: &ConnectionConfig,
) -> Result<String, ConnectionUrlError> {
    let cluster_id = config
        .cluster_id
        .as_deref()
        .ok_or(ConnectionUrlError::MissingClusterId)?;
    let namespace = workspace.namespace().unwrap_or_default();
    let name = workspace.name_any();

    let pod_uid = backends
        .store
        .get_workspace_pod_uid(&namespace, &name)
        .await
        .map_err(ConnectionUrlError::Store)?
        .ok_or_else(|| ConnectionUrlError::NoPod(name.clone()))?;

    let session = backends
        .tunnel
        .start_session(&pod_uid)
        .await
        .map_err(ConnectionUrlError::Tunnel)?;
    tracing::info!(
        %namespace,
        workspace = %name,
        %pod_uid,
        session = %session.session_id,
        "Started remote session"
    );

    compose_url(&session, &name, &namespace, cluster_id)
}

pub fn compose_url(
    session: &SessionInfo,
    workspace: &str,
    namespace: &str,
    cluster_id: &str,
) -> Result<String, ConnectionUrlError> {
    let mut url = Url::parse(VSCODE_SCHEME)?;
    url.query_pairs_mut()
        .append_pair("sessionId", &session.session_id)
        .append_pair("sessionToken", &session.token_value)
        .append_pair("streamUrl", &session.stream_url)
        .append_pair("workspaceName", workspace)
        .append_pair("namespace", namespace)
        .append_pair("eksClusterArn", cluster_id);
    Ok(url.into())
}
