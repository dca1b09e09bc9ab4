use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use workspace_connection_k8s_api::{
    Pod, ResourceExt, Workspace, WorkspaceAccessStrategy, WORKSPACE_NAME_LABEL,
};

pub type SharedIndex = Arc<RwLock<Index>>;

/// Holds all `Workspace`, `WorkspaceAccessStrategy`, and workspace `Pod`
/// state needed to serve connection requests.
#[derive(Debug, Default)]
pub struct Index {
    workspaces: HashMap<NsName, Workspace>,
    access_strategies: HashMap<NsName, WorkspaceAccessStrategy>,

    /// Pod UIDs by pod name, keyed by the workspace they back.
    pods_by_workspace: HashMap<NsName, BTreeMap<String, String>>,

    /// The workspace each indexed pod backs, keyed by pod.
    workspace_by_pod: HashMap<NsName, String>,
}

/// A namespace and name pair.
type NsName = (String, String);

// === impl Index ===

impl Index {
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn workspace(&self, namespace: &str, name: &str) -> Option<&Workspace> {
        self.workspaces
            .get(&(namespace.to_string(), name.to_string()))
    }

    pub fn access_strategy(&self, namespace: &str, name: &str) -> Option<&WorkspaceAccessStrategy> {
        self.access_strategies
            .get(&(namespace.to_string(), name.to_string()))
    }

    /// Returns the UID of the first pod, by name, backing the workspace.
    pub fn workspace_pod_uid(&self, namespace: &str, workspace: &str) -> Option<&str> {
        self.pods_by_workspace
            .get(&(namespace.to_string(), workspace.to_string()))?
            .values()
            .next()
            .map(String::as_str)
    }

    fn remove_pod(&mut self, namespace: &str, pod: &str) {
        let key = (namespace.to_string(), pod.to_string());
        let Some(workspace) = self.workspace_by_pod.remove(&key) else {
            return;
        };
        let ws_key = (namespace.to_string(), workspace);
        if let Some(pods) = self.pods_by_workspace.get_mut(&ws_key) {
            pods.remove(pod);
            if pods.is_empty() {
                self.pods_by_workspace.remove(&ws_key);
            }
        }
    }
}

impl kubert::index::IndexNamespacedResource<Workspace> for Index {
    fn apply(&mut self, workspace: Workspace) {
        let Some(namespace) = workspace.namespace() else {
            tracing::warn!(name = %workspace.name_any(), "Ignoring workspace without a namespace");
            return;
        };
        let name = workspace.name_unchecked();
        tracing::debug!(%namespace, %name, "Indexing workspace");
        self.workspaces.insert((namespace, name), workspace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        tracing::debug!(%namespace, %name, "Removing workspace");
        self.workspaces.remove(&(namespace, name));
    }
}

impl kubert::index::IndexNamespacedResource<WorkspaceAccessStrategy> for Index {
    fn apply(&mut self, strategy: WorkspaceAccessStrategy) {
        let Some(namespace) = strategy.namespace() else {
            tracing::warn!(
                name = %strategy.name_any(),
                "Ignoring access strategy without a namespace"
            );
            return;
        };
        let name = strategy.name_unchecked();
        tracing::debug!(%namespace, %name, "Indexing access strategy");
        self.access_strategies.insert((namespace, name), strategy);
    }

    fn delete(&mut self, namespace: String, name: String) {
        tracing::debug!(%namespace, %name, "Removing access strategy");
        self.access_strategies.remove(&(namespace, name));
    }
}

impl kubert::index::IndexNamespacedResource<Pod> for Index {
    fn apply(&mut self, pod: Pod) {
        let Some(namespace) = pod.namespace() else {
            return;
        };
        let name = pod.name_unchecked();

        // A pod may be relabeled, so any previous association is dropped first.
        self.remove_pod(&namespace, &name);

        let workspace = pod
            .labels()
            .get(WORKSPACE_NAME_LABEL)
            .filter(|ws| !ws.is_empty())
            .cloned();
        let (Some(workspace), Some(uid)) = (workspace, pod.uid()) else {
            return;
        };

        tracing::debug!(%namespace, pod = %name, %workspace, "Indexing workspace pod");
        self.pods_by_workspace
            .entry((namespace.clone(), workspace.clone()))
            .or_default()
            .insert(name.clone(), uid);
        self.workspace_by_pod.insert((namespace, name), workspace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_pod(&namespace, &name);
    }
}
