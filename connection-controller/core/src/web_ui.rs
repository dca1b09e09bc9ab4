//! Browser connections authenticated with a short-lived bearer token.

use crate::{
    connection::{Backends, ConnectionUrlError},
    subject::Subject,
    template,
};
use anyhow::Result;
use url::Url;
use workspace_connection_k8s_api::{ResourceExt, Workspace};

pub const TOKEN_TYPE: &str = "web-ui";

const BEARER_AUTH_SUFFIX: &str = "/bearer-auth";

/// What a minted token grants access to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenScope {
    pub subject: Subject,
    pub path: String,
    pub domain: String,
    pub token_type: &'static str,
}

pub trait SignToken: Send + Sync {
    fn sign_token(&self, scope: &TokenScope) -> Result<String>;
}

pub(crate) async fn connection_url(
    workspace: &Workspace,
    subject: &Subject,
    backends: &Backends,
) -> Result<String, ConnectionUrlError> {
    let strategy_ref = workspace
        .spec
        .access_strategy
        .as_ref()
        .ok_or(ConnectionUrlError::NoAccessStrategy)?;
    let workspace_ns = workspace.namespace().unwrap_or_default();
    let strategy_ns = strategy_ref.namespace_or(&workspace_ns);

    let strategy = backends
        .store
        .get_access_strategy(strategy_ns, &strategy_ref.name)
        .await
        .map_err(ConnectionUrlError::Store)?
        .ok_or_else(|| ConnectionUrlError::AccessStrategyNotFound {
            namespace: strategy_ns.to_string(),
            name: strategy_ref.name.clone(),
        })?;
    let template = strategy
        .bearer_auth_url_template()
        .ok_or(ConnectionUrlError::NoBearerTemplate)?;

    let rendered = template::render_bearer_auth_url(template, workspace, &strategy)?;
    let mut url = Url::parse(&rendered)?;
    let scope = token_scope(&url, subject)?;
    let token = backends
        .signer
        .sign_token(&scope)
        .map_err(ConnectionUrlError::Signer)?;
    url.query_pairs_mut().append_pair("token", &token);
    Ok(url.into())
}

/// Scopes a token to the host and path of a rendered bearer-auth URL.
pub fn token_scope(url: &Url, subject: &Subject) -> Result<TokenScope, ConnectionUrlError> {
    let host = url.host_str().ok_or(ConnectionUrlError::MissingHost)?;
    let domain = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let path = url.path();
    let path = match path.strip_suffix(BEARER_AUTH_SUFFIX) {
        Some("") => "/",
        Some(stripped) => stripped,
        None => path,
    };

    Ok(TokenScope {
        subject: subject.clone(),
        path: path.to_string(),
        domain,
        token_type: TOKEN_TYPE,
    })
}
