#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use workspace_connection_core as core;
pub use workspace_connection_k8s_api as k8s;
pub use workspace_connection_k8s_index as index;

mod access_review;
mod api;
mod args;
mod authn;
mod connections;
mod discovery;
mod jwt;
mod metrics;
mod rbac;
mod response;
mod routes;
mod tunnel;

pub use self::{
    api::{ApiConfig, ConnectionApi, DEFAULT_API_PATH},
    args::Args,
    jwt::{Claims, JwtSigner},
    metrics::ApiMetrics,
    rbac::SubjectAccessReviewer,
    tunnel::SessionBroker,
};

/// Serves resource lookups from the watch-maintained index.
#[derive(Clone, Debug)]
pub struct ResourceCache(index::SharedIndex);

// === impl ResourceCache ===

impl ResourceCache {
    pub fn new(index: index::SharedIndex) -> Self {
        Self(index)
    }
}

#[async_trait::async_trait]
impl core::ResourceStore for ResourceCache {
    async fn get_workspace(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<k8s::Workspace>> {
        Ok(self.0.read().workspace(namespace, name).cloned())
    }

    async fn get_access_strategy(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<k8s::WorkspaceAccessStrategy>> {
        Ok(self.0.read().access_strategy(namespace, name).cloned())
    }

    async fn get_workspace_pod_uid(
        &self,
        namespace: &str,
        workspace: &str,
    ) -> anyhow::Result<Option<String>> {
        Ok(self
            .0
            .read()
            .workspace_pod_uid(namespace, workspace)
            .map(Into::into))
    }
}
