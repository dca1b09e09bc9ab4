use crate::{
    access_review, connections,
    core::{Backends, ConnectionConfig},
    discovery,
    k8s::connection::{CONNECTION_ACCESS_REVIEWS_RESOURCE, WORKSPACE_CONNECTIONS_RESOURCE},
    metrics::ApiMetrics,
    response::{ApiError, Body},
    routes::{Dispatch, Router},
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tracing::{debug, field, info_span, warn, Instrument};

pub const DEFAULT_API_PATH: &str = "/apis/connection.workspace.jupyter.org/v1alpha1";

/// Serves the connection extension API.
#[derive(Clone)]
pub struct ConnectionApi {
    router: Arc<Router<Handler>>,
    shared: Arc<Shared>,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub api_path: String,
    pub connection: ConnectionConfig,

    /// Whether front-proxy identity headers are trusted as verified.
    pub trust_request_headers: bool,
}

/// State available to every handler.
pub(crate) struct Shared {
    pub(crate) backends: Backends,
    pub(crate) config: ApiConfig,
    pub(crate) metrics: ApiMetrics,
}

/// Per-request state passed to handlers.
#[derive(Debug)]
pub(crate) struct RequestContext {
    pub(crate) span: tracing::Span,
    pub(crate) method: http::Method,
    pub(crate) path: String,
    pub(crate) remote: Option<SocketAddr>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Handler {
    Health,
    Discovery,
    CreateConnection,
    AccessReview,
}

// === impl ConnectionApi ===

impl ConnectionApi {
    pub fn new(config: ApiConfig, backends: Backends, metrics: ApiMetrics) -> Self {
        let mut router = Router::new(&config.api_path);
        router.register_route("/health", Handler::Health);
        router.register_route(&config.api_path, Handler::Discovery);
        router.register_namespaced_routes([
            (WORKSPACE_CONNECTIONS_RESOURCE, Handler::CreateConnection),
            ("connections", Handler::CreateConnection),
            (CONNECTION_ACCESS_REVIEWS_RESOURCE, Handler::AccessReview),
            ("connectionaccessreview", Handler::AccessReview),
        ]);

        Self {
            router: Arc::new(router),
            shared: Arc::new(Shared {
                backends,
                config,
                metrics,
            }),
        }
    }

    async fn handle<B>(self, ctx: RequestContext, req: Request<B>) -> Result<Response<Body>, Error>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let (route, rsp) = match self.router.dispatch(&ctx.path) {
            Dispatch::Exact(handler) => {
                let rsp = self.serve(handler, &ctx, None, req).await;
                (handler.label(), rsp)
            }
            Dispatch::Namespaced { handler, namespace } => {
                ctx.span.record("namespace", field::display(&namespace));
                let rsp = self.serve(handler, &ctx, Some(&namespace), req).await;
                (handler.label(), rsp)
            }
            Dispatch::MissingNamespace => (
                "namespaced",
                Err(ApiError::bad_request("Invalid or missing namespace in path")),
            ),
            Dispatch::NotFound => (
                "unknown",
                Err(ApiError::not_found(
                    "the server could not find the requested resource",
                )),
            ),
        };

        let rsp = match rsp {
            Ok(rsp) => rsp,
            Err(error) => {
                debug!(
                    parent: &ctx.span,
                    status = %error.status(),
                    message = error.message(),
                    "Request failed"
                );
                error.into_response()?
            }
        };
        self.shared.metrics.request(route, rsp.status());
        Ok(rsp)
    }

    async fn serve<B>(
        &self,
        handler: Handler,
        ctx: &RequestContext,
        namespace: Option<&str>,
        req: Request<B>,
    ) -> Result<Response<Body>, ApiError>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();
        match handler {
            Handler::Health => discovery::health(&parts.method),
            Handler::Discovery => discovery::resources(&parts.method),
            Handler::CreateConnection => {
                let (namespace, body) = namespaced_body(ctx, namespace, body).await?;
                connections::create(&self.shared, ctx, namespace, &parts, body).await
            }
            Handler::AccessReview => {
                let (namespace, body) = namespaced_body(ctx, namespace, body).await?;
                access_review::review(&self.shared, ctx, namespace, &parts, body).await
            }
        }
    }
}

async fn namespaced_body<'n, B>(
    ctx: &RequestContext,
    namespace: Option<&'n str>,
    body: B,
) -> Result<(&'n str, bytes::Bytes), ApiError>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let Some(namespace) = namespace else {
        return Err(ApiError::bad_request("Invalid or missing namespace in path"));
    };
    match body.collect().await {
        Ok(body) => Ok((namespace, body.to_bytes())),
        Err(error) => {
            warn!(parent: &ctx.span, %error, "Failed to read request body");
            Err(ApiError::bad_request("Failed to read request body"))
        }
    }
}

impl<B> tower::Service<Request<B>> for ConnectionApi
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display + Send,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let remote = req.extensions().get::<SocketAddr>().copied();
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            remote = field::Empty,
            namespace = field::Empty,
        );
        if let Some(addr) = remote {
            span.record("remote", field::display(addr));
        }
        let ctx = RequestContext {
            span: span.clone(),
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            remote,
        };
        debug!(
            parent: &ctx.span,
            method = %ctx.method,
            path = %ctx.path,
            remote = ?ctx.remote,
            "Handling request"
        );

        let api = self.clone();
        Box::pin(api.handle(ctx, req).instrument(span))
    }
}

// === impl Handler ===

impl Handler {
    fn label(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Discovery => "discovery",
            Self::CreateConnection => WORKSPACE_CONNECTIONS_RESOURCE,
            Self::AccessReview => CONNECTION_ACCESS_REVIEWS_RESOURCE,
        }
    }
}
