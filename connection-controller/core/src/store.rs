use anyhow::Result;
use workspace_connection_k8s_api::{Workspace, WorkspaceAccessStrategy};

/// Read access to the cluster resources a connection depends on.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_workspace(&self, namespace: &str, name: &str) -> Result<Option<Workspace>>;

    async fn get_access_strategy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkspaceAccessStrategy>>;

    /// Returns the UID of a pod backing the named workspace.
    ///
    /// When several pods carry the workspace label, the one whose name sorts
    /// first is returned.
    async fn get_workspace_pod_uid(&self, namespace: &str, workspace: &str)
        -> Result<Option<String>>;
}
