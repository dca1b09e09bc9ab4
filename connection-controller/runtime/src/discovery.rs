use crate::{
    k8s::connection::{
        API_VERSION, CONNECTION_ACCESS_REVIEWS_RESOURCE, CONNECTION_ACCESS_REVIEW_KIND,
        WORKSPACE_CONNECTIONS_RESOURCE, WORKSPACE_CONNECTION_KIND,
    },
    response::{json_response, ApiError, Body},
};
use hyper::{http, Response};
use serde_json::json;

pub(crate) fn health(method: &http::Method) -> Result<Response<Body>, ApiError> {
    ensure_read(method)?;
    Ok(json_response(
        http::StatusCode::OK,
        &json!({ "status": "ok" }),
    )?)
}

/// Describes the resources served under the API prefix.
pub(crate) fn resources(method: &http::Method) -> Result<Response<Body>, ApiError> {
    ensure_read(method)?;
    let list = json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": API_VERSION,
        "resources": [
            {
                "name": WORKSPACE_CONNECTIONS_RESOURCE,
                "singularName": "workspaceconnection",
                "namespaced": true,
                "kind": WORKSPACE_CONNECTION_KIND,
                "verbs": ["create"],
            },
            {
                "name": CONNECTION_ACCESS_REVIEWS_RESOURCE,
                "singularName": "connectionaccessreview",
                "namespaced": true,
                "kind": CONNECTION_ACCESS_REVIEW_KIND,
                "verbs": ["create"],
            },
        ],
    });
    Ok(json_response(http::StatusCode::OK, &list)?)
}

fn ensure_read(method: &http::Method) -> Result<(), ApiError> {
    if method == http::Method::GET || method == http::Method::HEAD {
        return Ok(());
    }
    Err(ApiError::method_not_allowed(format!(
        "method {method} is not allowed"
    )))
}
