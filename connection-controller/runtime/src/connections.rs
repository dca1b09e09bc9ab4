use crate::{
    api::{RequestContext, Shared},
    authn::{resolve_subject, ResolvedSubject},
    core::{ConnectionType, Permission},
    k8s::connection::{
        WorkspaceConnectionRequest, WorkspaceConnectionRequestSpec, WorkspaceConnectionResponse,
        WorkspaceConnectionResponseStatus, API_VERSION, WORKSPACE_CONNECTION_KIND,
    },
    metrics::ConnectionOutcome,
    response::{json_response, ApiError, Body},
};
use bytes::Bytes;
use hyper::{
    http::{self, request::Parts},
    Response,
};
use tracing::{error, info, warn};

const CLUSTER_ID_MISSING: &str =
    "CLUSTER_ID not configured. Please set the cluster identifier in the server configuration";

/// Creates a `WorkspaceConnection`: authorizes the caller against the
/// workspace and returns a freshly minted connection URL.
pub(crate) async fn create(
    shared: &Shared,
    ctx: &RequestContext,
    namespace: &str,
    parts: &Parts,
    body: Bytes,
) -> Result<Response<Body>, ApiError> {
    if parts.method != http::Method::POST {
        return Err(ApiError::bad_request("Connection must use POST method"));
    }

    let req: WorkspaceConnectionRequest = serde_json::from_slice(&body).map_err(|error| {
        warn!(parent: &ctx.span, %error, "Failed to parse JSON request body");
        ApiError::bad_request("Invalid JSON")
    })?;
    let ty = validate(&req.spec)?;

    // The role backend is never consulted for a type this server can't serve.
    if ty.requires_cluster_id() && shared.config.connection.cluster_id.is_none() {
        error!(parent: &ctx.span, "Cluster identifier is not configured");
        return Err(ApiError::bad_request(CLUSTER_ID_MISSING));
    }

    let Some(ResolvedSubject { subject, trust }) =
        resolve_subject(parts, shared.config.trust_request_headers)
    else {
        return Err(ApiError::unauthorized("no user identity in request"));
    };

    let workspace_name = &req.spec.workspace_name;
    info!(
        parent: &ctx.span,
        %namespace,
        workspace = %workspace_name,
        connection_type = %ty,
        user = %subject.username,
        ?trust,
        "Creating workspace connection"
    );

    let Permission {
        decision,
        workspace,
    } = shared
        .backends
        .permission_checker()
        .check(namespace, workspace_name, &subject)
        .await
        .map_err(|error| {
            error!(parent: &ctx.span, error = %format!("{error:#}"), "Authorization failed");
            shared.metrics.connection(ty, ConnectionOutcome::Failed);
            ApiError::internal("Failed to verify access permission")
        })?;
    shared.metrics.decision(decision);
    info!(parent: &ctx.span, %decision, reason = decision.reason(), "Authorization decision");

    if decision.is_not_found() {
        shared.metrics.connection(ty, ConnectionOutcome::NotFound);
        return Err(ApiError::not_found(decision.reason()));
    }
    let workspace = match workspace {
        Some(workspace) if decision.is_allowed() => workspace,
        _ => {
            shared.metrics.connection(ty, ConnectionOutcome::Denied);
            return Err(ApiError::forbidden(decision.reason()));
        }
    };

    let url = ty
        .connection_url(
            &workspace,
            &subject,
            &shared.backends,
            &shared.config.connection,
        )
        .await
        .map_err(|error| {
            let message = error.to_string();
            let error = anyhow::Error::from(error);
            error!(
                parent: &ctx.span,
                error = %format!("{error:#}"),
                connection_type = %ty,
                "Failed to generate connection URL"
            );
            shared.metrics.connection(ty, ConnectionOutcome::Failed);
            ApiError::internal(message)
        })?;

    shared.metrics.connection(ty, ConnectionOutcome::Created);
    let rsp = WorkspaceConnectionResponse {
        api_version: API_VERSION.to_string(),
        kind: WORKSPACE_CONNECTION_KIND.to_string(),
        metadata: req.metadata,
        spec: req.spec,
        status: WorkspaceConnectionResponseStatus {
            workspace_connection_type: ty.to_string(),
            workspace_connection_url: url,
        },
    };
    Ok(json_response(http::StatusCode::CREATED, &rsp)?)
}

fn validate(spec: &WorkspaceConnectionRequestSpec) -> Result<ConnectionType, ApiError> {
    if spec.workspace_name.is_empty() {
        return Err(ApiError::bad_request("workspaceName is required"));
    }
    if spec.workspace_connection_type.is_empty() {
        return Err(ApiError::bad_request("workspaceConnectionType is required"));
    }
    spec.workspace_connection_type
        .parse()
        .map_err(|error: crate::core::connection::InvalidConnectionType| {
            ApiError::bad_request(error.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, ty: &str) -> WorkspaceConnectionRequestSpec {
        WorkspaceConnectionRequestSpec {
            workspace_name: name.to_string(),
            workspace_connection_type: ty.to_string(),
        }
    }

    #[test]
    fn validates_required_fields() {
        let err = validate(&spec("", "web-ui")).unwrap_err();
        assert_eq!(err.message(), "workspaceName is required");

        let err = validate(&spec("ws-0", "")).unwrap_err();
        assert_eq!(err.message(), "workspaceConnectionType is required");

        let err = validate(&spec("ws-0", "ssh")).unwrap_err();
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(
            err.message(),
            "invalid workspaceConnectionType: 'ssh'. Valid types are: 'vscode-remote', 'web-ui'"
        );
    }

    #[test]
    fn parses_connection_types() {
        assert_eq!(
            validate(&spec("ws-0", "web-ui")).unwrap(),
            ConnectionType::WebUi
        );
        assert_eq!(
            validate(&spec("ws-0", "vscode-remote")).unwrap(),
            ConnectionType::VscodeRemote
        );
    }
}
