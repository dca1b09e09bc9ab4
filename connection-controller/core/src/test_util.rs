use crate::{
    authz::{AccessCheck, AuthorizeSubject},
    store::ResourceStore,
    vscode::{SessionInfo, StartSession},
    web_ui::{SignToken, TokenScope},
};
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};
use workspace_connection_k8s_api::{
    access_strategy::WorkspaceAccessStrategySpec, AccessStrategyRef, ObjectMeta, Workspace,
    WorkspaceAccessStrategy, WorkspaceSpec, OWNER_ANNOTATION,
};

pub fn mk_workspace(
    ns: &str,
    name: &str,
    access_type: Option<&str>,
    owner: Option<&str>,
) -> Workspace {
    Workspace {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            uid: Some(format!("{name}-uid")),
            annotations: owner
                .map(|o| maplit::btreemap! { OWNER_ANNOTATION.to_string() => o.to_string() }),
            ..Default::default()
        },
        spec: WorkspaceSpec {
            display_name: name.to_string(),
            image: None,
            desired_status: None,
            access_type: access_type.map(Into::into),
            access_strategy: None,
            template_ref: None,
        },
        status: None,
    }
}

pub fn with_strategy(mut ws: Workspace, name: &str, ns: Option<&str>) -> Workspace {
    ws.spec.access_strategy = Some(AccessStrategyRef {
        name: name.to_string(),
        namespace: ns.map(Into::into),
    });
    ws
}

pub fn mk_strategy(ns: &str, name: &str, bearer_template: Option<&str>) -> WorkspaceAccessStrategy {
    WorkspaceAccessStrategy {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: WorkspaceAccessStrategySpec {
            display_name: name.to_string(),
            access_resource_templates: vec![],
            access_url_template: None,
            bearer_auth_url_template: bearer_template.map(Into::into),
            create_connection_handler: None,
            create_connection_context: None,
        },
        status: None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCheck {
    pub namespace: String,
    pub verb: String,
    pub group: String,
    pub resource: String,
    pub username: String,
}

#[derive(Copy, Clone, Debug, Default)]
enum Mode {
    #[default]
    Allow,
    Deny,
    Fail,
}

#[derive(Clone, Default)]
pub struct StubAuthz {
    mode: Mode,
    checks: Arc<Mutex<Vec<RecordedCheck>>>,
}

#[derive(Clone, Default)]
pub struct StubStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    workspaces: BTreeMap<(String, String), Workspace>,
    strategies: BTreeMap<(String, String), WorkspaceAccessStrategy>,
    pods: BTreeMap<(String, String), String>,
    workspace_lookups: usize,
    fail_workspaces: bool,
    fail_strategies: bool,
}

#[derive(Clone, Default)]
pub struct StubTunnel {
    fail: bool,
    targets: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone, Default)]
pub struct StubSigner {
    scopes: Arc<Mutex<Vec<TokenScope>>>,
}

// === impl StubAuthz ===

impl StubAuthz {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn deny() -> Self {
        Self {
            mode: Mode::Deny,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: Mode::Fail,
            ..Default::default()
        }
    }

    pub fn checks(&self) -> Vec<RecordedCheck> {
        self.checks.lock().clone()
    }
}

#[async_trait::async_trait]
impl AuthorizeSubject for StubAuthz {
    async fn check_access(&self, check: &AccessCheck<'_>) -> Result<bool> {
        self.checks.lock().push(RecordedCheck {
            namespace: check.namespace.to_string(),
            verb: check.verb.to_string(),
            group: check.group.to_string(),
            resource: check.resource.to_string(),
            username: check.subject.username.clone(),
        });
        match self.mode {
            Mode::Allow => Ok(true),
            Mode::Deny => Ok(false),
            Mode::Fail => bail!("authorization backend unavailable"),
        }
    }
}

// === impl StubStore ===

impl StubStore {
    pub fn insert_workspace(&self, ws: Workspace) {
        let key = (
            ws.metadata.namespace.clone().unwrap_or_default(),
            ws.metadata.name.clone().unwrap_or_default(),
        );
        self.inner.lock().workspaces.insert(key, ws);
    }

    pub fn insert_strategy(&self, strategy: WorkspaceAccessStrategy) {
        let key = (
            strategy.metadata.namespace.clone().unwrap_or_default(),
            strategy.metadata.name.clone().unwrap_or_default(),
        );
        self.inner.lock().strategies.insert(key, strategy);
    }

    pub fn insert_pod(&self, ns: &str, workspace: &str, uid: &str) {
        self.inner
            .lock()
            .pods
            .insert((ns.to_string(), workspace.to_string()), uid.to_string());
    }

    pub fn fail_workspace_lookups(&self) {
        self.inner.lock().fail_workspaces = true;
    }

    pub fn fail_strategy_lookups(&self) {
        self.inner.lock().fail_strategies = true;
    }

    pub fn workspace_lookups(&self) -> usize {
        self.inner.lock().workspace_lookups
    }
}

#[async_trait::async_trait]
impl ResourceStore for StubStore {
    async fn get_workspace(&self, namespace: &str, name: &str) -> Result<Option<Workspace>> {
        let mut state = self.inner.lock();
        state.workspace_lookups += 1;
        if state.fail_workspaces {
            bail!("store unavailable");
        }
        Ok(state
            .workspaces
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_access_strategy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkspaceAccessStrategy>> {
        let state = self.inner.lock();
        if state.fail_strategies {
            bail!("store unavailable");
        }
        Ok(state
            .strategies
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_workspace_pod_uid(
        &self,
        namespace: &str,
        workspace: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .pods
            .get(&(namespace.to_string(), workspace.to_string()))
            .cloned())
    }
}

// === impl StubTunnel ===

impl StubTunnel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

#[async_trait::async_trait]
impl StartSession for StubTunnel {
    async fn start_session(&self, target_id: &str) -> Result<SessionInfo> {
        self.targets.lock().push(target_id.to_string());
        if self.fail {
            bail!("broker refused session for {target_id}");
        }
        Ok(SessionInfo {
            session_id: "sess-1".to_string(),
            token_value: "tok/en+1".to_string(),
            stream_url: "wss://stream.example.com/s?id=1".to_string(),
        })
    }
}

// === impl StubSigner ===

impl StubSigner {
    pub fn scopes(&self) -> Vec<TokenScope> {
        self.scopes.lock().clone()
    }
}

impl SignToken for StubSigner {
    fn sign_token(&self, scope: &TokenScope) -> Result<String> {
        self.scopes.lock().push(scope.clone());
        Ok("signed.jwt.token".to_string())
    }
}
