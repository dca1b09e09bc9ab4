//! Client for the remote session broker.
//!
//! The broker starts managed sessions to a workspace pod on behalf of remote
//! IDE clients:
//!
//! ```text
//! POST <broker>/v1/sessions {"targetId": "<pod uid>", "documentName": "..."}
//! 200 {"sessionId": "...", "tokenValue": "...", "streamUrl": "..."}
//! ```

use crate::core::{SessionInfo, StartSession};
use anyhow::{bail, ensure, Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{http, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct SessionBroker {
    inner: Option<Configured>,
}

#[derive(Clone, Debug)]
struct Configured {
    client: Client<HttpConnector, Full<Bytes>>,
    sessions_uri: http::Uri,
    document_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest<'a> {
    target_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_name: Option<&'a str>,
}

// === impl SessionBroker ===

impl SessionBroker {
    pub fn new(base: Option<&url::Url>, document_name: Option<String>) -> Result<Self> {
        let Some(base) = base else {
            return Ok(Self { inner: None });
        };
        ensure!(
            base.scheme() == "http",
            "unsupported session broker scheme: {}",
            base.scheme()
        );
        let sessions_uri = format!("{}/v1/sessions", base.as_str().trim_end_matches('/'))
            .parse()
            .context("invalid session broker URL")?;
        Ok(Self {
            inner: Some(Configured {
                client: Client::builder(TokioExecutor::new()).build_http(),
                sessions_uri,
                document_name,
            }),
        })
    }
}

#[async_trait::async_trait]
impl StartSession for SessionBroker {
    async fn start_session(&self, target_id: &str) -> Result<SessionInfo> {
        let Some(broker) = &self.inner else {
            bail!("remote session broker not configured");
        };

        let body = serde_json::to_vec(&StartSessionRequest {
            target_id,
            document_name: broker.document_name.as_deref(),
        })?;
        let req = Request::builder()
            .method(http::Method::POST)
            .uri(broker.sessions_uri.clone())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        let rsp = broker.client.request(req).await?;
        let status = rsp.status();
        let bytes = rsp.into_body().collect().await?.to_bytes();
        ensure!(
            status.is_success(),
            "session broker responded with {status}"
        );

        let info: SessionInfo =
            serde_json::from_slice(&bytes).context("invalid session broker response")?;
        ensure!(
            !info.session_id.is_empty()
                && !info.token_value.is_empty()
                && !info.stream_url.is_empty(),
            "session broker response is missing session fields"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{body::Incoming, service::service_fn, Response};
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    /// Serves a single request with the given status and body, returning the
    /// path and body of the request that was received.
    async fn serve_once(
        status: http::StatusCode,
        body: &'static str,
    ) -> (url::Url, tokio::task::JoinHandle<(String, Bytes)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (tx, rx) = tokio::sync::oneshot::channel();
            let tx = std::sync::Mutex::new(Some(tx));
            let svc = service_fn(move |req: Request<Incoming>| {
                let tx = tx.lock().unwrap().take();
                async move {
                    let path = req.uri().path().to_string();
                    let bytes = req.into_body().collect().await.unwrap().to_bytes();
                    if let Some(tx) = tx {
                        let _ = tx.send((path, bytes));
                    }
                    Ok::<_, Infallible>(
                        Response::builder()
                            .status(status)
                            .body(Full::new(Bytes::from_static(body.as_bytes())))
                            .unwrap(),
                    )
                }
            });
            tokio::spawn(async move {
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
            rx.await.unwrap()
        });
        let url = format!("http://{addr}/").parse().unwrap();
        (url, task)
    }

    #[tokio::test]
    async fn unconfigured() {
        let broker = SessionBroker::new(None, None).unwrap();
        let err = broker.start_session("pod-uid").await.unwrap_err();
        assert_eq!(err.to_string(), "remote session broker not configured");
    }

    #[test]
    fn rejects_unsupported_schemes() {
        let url = "ftp://broker.example.com".parse().unwrap();
        assert!(SessionBroker::new(Some(&url), None).is_err());
    }

    #[tokio::test]
    async fn starts_session() {
        let (url, server) = serve_once(
            http::StatusCode::OK,
            r#"{"sessionId":"s-1","tokenValue":"t-1","streamUrl":"wss://stream/s-1"}"#,
        )
        .await;
        let broker = SessionBroker::new(Some(&url), Some("doc-0".to_string())).unwrap();
        let info = broker.start_session("pod-uid").await.unwrap();
        assert_eq!(
            info,
            SessionInfo {
                session_id: "s-1".to_string(),
                token_value: "t-1".to_string(),
                stream_url: "wss://stream/s-1".to_string(),
            }
        );

        let (path, body) = server.await.unwrap();
        assert_eq!(path, "/v1/sessions");
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "targetId": "pod-uid", "documentName": "doc-0" })
        );
    }

    #[tokio::test]
    async fn error_status_fails() {
        let (url, _server) = serve_once(http::StatusCode::BAD_GATEWAY, "{}").await;
        let broker = SessionBroker::new(Some(&url), None).unwrap();
        let err = broker.start_session("pod-uid").await.unwrap_err();
        assert!(err.to_string().contains("502"), "{err}");
    }

    #[tokio::test]
    async fn incomplete_response_fails() {
        let (url, _server) =
            serve_once(http::StatusCode::OK, r#"{"sessionId":"","tokenValue":"t","streamUrl":"s"}"#)
                .await;
        let broker = SessionBroker::new(Some(&url), None).unwrap();
        assert!(broker.start_session("pod-uid").await.is_err());
    }
}
