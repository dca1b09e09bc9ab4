use crate::{
    api::{RequestContext, Shared},
    core::Subject,
    k8s::connection::{ConnectionAccessReview, API_VERSION, CONNECTION_ACCESS_REVIEW_KIND},
    response::{json_response, ApiError, Body},
};
use bytes::Bytes;
use hyper::{
    http::{self, request::Parts},
    Response,
};
use tracing::{error, info, warn};

/// Answers whether the subject named in the review may connect to a
/// workspace.
///
/// Denials and missing workspaces are reported in the review status rather
/// than as request failures.
pub(crate) async fn review(
    shared: &Shared,
    ctx: &RequestContext,
    namespace: &str,
    parts: &Parts,
    body: Bytes,
) -> Result<Response<Body>, ApiError> {
    if parts.method != http::Method::POST {
        return Err(ApiError::bad_request(
            "ConnectionAccessReview must use POST method",
        ));
    }

    let mut review: ConnectionAccessReview = serde_json::from_slice(&body).map_err(|error| {
        warn!(parent: &ctx.span, %error, "Failed to parse ConnectionAccessReview");
        ApiError::bad_request("Invalid ConnectionAccessReview format")
    })?;
    review.metadata.namespace = Some(namespace.to_string());

    if review.spec.workspace_name.is_empty() {
        return Err(ApiError::bad_request(
            "WorkspaceName is required in the spec",
        ));
    }

    let subject = Subject {
        username: review.spec.user.clone(),
        groups: review.spec.groups.clone(),
        uid: review.spec.uid.clone(),
        extra: review.spec.extra.clone().unwrap_or_default(),
    };
    let permission = shared
        .backends
        .permission_checker()
        .check(namespace, &review.spec.workspace_name, &subject)
        .await
        .map_err(|error| {
            error!(parent: &ctx.span, error = %format!("{error:#}"), "Authorization failed");
            ApiError::internal("Failed to verify access permission")
        })?;
    let decision = permission.decision;
    shared.metrics.decision(decision);
    info!(
        parent: &ctx.span,
        %namespace,
        workspace = %review.spec.workspace_name,
        user = %subject.username,
        groups = %subject.groups.join(","),
        allowed = decision.is_allowed(),
        reason = decision.reason(),
        "ConnectionAccessReview result"
    );

    review.api_version = Some(API_VERSION.to_string());
    review.kind = Some(CONNECTION_ACCESS_REVIEW_KIND.to_string());
    review.status = Some(decision.into());
    Ok(json_response(http::StatusCode::OK, &review)?)
}
