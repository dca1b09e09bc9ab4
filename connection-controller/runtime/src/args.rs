use crate::{
    api::{ApiConfig, ConnectionApi, DEFAULT_API_PATH},
    core::{Backends, ConnectionConfig},
    index::Index,
    jwt::{JwtSigner, DEFAULT_AUDIENCE, DEFAULT_ISSUER},
    k8s,
    metrics::ApiMetrics,
    rbac::SubjectAccessReviewer,
    tunnel::SessionBroker,
    ResourceCache,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{info, info_span, warn, Instrument};

const SIGNING_KEY_ENV: &str = "JWT_SIGNING_KEY";

#[derive(Debug, Parser)]
#[clap(
    name = "workspace-connection",
    about = "Serves workspace connections through the Kubernetes API aggregation layer"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "workspace_connection=info,warn",
        env = "WORKSPACE_CONNECTION_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, default_value = DEFAULT_API_PATH)]
    api_path: String,

    /// Identifies this cluster to remote IDE clients.
    ///
    /// Remote IDE connections are refused when unset.
    #[clap(long, env = "CLUSTER_ID")]
    cluster_id: Option<String>,

    /// A file holding the bearer token signing key.
    ///
    /// When unset, the key is read from the `JWT_SIGNING_KEY` environment
    /// variable.
    #[clap(long)]
    jwt_signing_key_file: Option<PathBuf>,

    #[clap(long, default_value = DEFAULT_ISSUER, env = "JWT_ISSUER")]
    jwt_issuer: String,

    #[clap(long, default_value = DEFAULT_AUDIENCE, env = "JWT_AUDIENCE")]
    jwt_audience: String,

    #[clap(long, default_value = "300")]
    jwt_expiration_secs: u64,

    /// The base URL of the remote session broker.
    #[clap(long, env = "SESSION_BROKER_URL")]
    session_broker_url: Option<url::Url>,

    #[clap(long, env = "SESSION_DOCUMENT_NAME")]
    session_document_name: Option<String>,

    /// Treats `X-Remote-*` front-proxy headers as a verified identity.
    ///
    /// Only set this when the server is reachable solely through the API
    /// aggregation layer.
    #[clap(long)]
    trust_request_headers: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            api_path,
            cluster_id,
            jwt_signing_key_file,
            jwt_issuer,
            jwt_audience,
            jwt_expiration_secs,
            session_broker_url,
            session_document_name,
            trust_request_headers,
        } = self;

        let key = signing_key(jwt_signing_key_file.as_deref())?;
        let signer = JwtSigner::new(
            &key,
            jwt_issuer,
            jwt_audience,
            Duration::from_secs(jwt_expiration_secs),
        )?;
        let broker = SessionBroker::new(session_broker_url.as_ref(), session_document_name)?;
        let cluster_id = cluster_id.filter(|id| !id.is_empty());

        let mut prom = <Registry>::default();
        let api_metrics =
            ApiMetrics::register(prom.sub_registry_with_prefix("workspace_connection"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        if cluster_id.is_none() {
            warn!("Cluster identifier not configured; remote IDE connections will be refused");
        }
        if session_broker_url.is_none() {
            warn!("Session broker not configured; remote IDE connections will fail");
        }

        // Build the index which serves workspace and pod lookups.
        let index = Index::shared();

        // Spawn resource watches.

        let workspaces = runtime.watch_all::<k8s::Workspace>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), workspaces)
                .instrument(info_span!("workspaces")),
        );

        let access_strategies =
            runtime.watch_all::<k8s::WorkspaceAccessStrategy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), access_strategies)
                .instrument(info_span!("workspaceaccessstrategies")),
        );

        let pods = runtime
            .watch_all::<k8s::Pod>(watcher::Config::default().labels(k8s::WORKSPACE_NAME_LABEL));
        tokio::spawn(kubert::index::namespaced(index.clone(), pods).instrument(info_span!("pods")));

        let backends = Backends {
            authz: Arc::new(SubjectAccessReviewer::new(runtime.client())),
            store: Arc::new(ResourceCache::new(index)),
            tunnel: Arc::new(broker),
            signer: Arc::new(signer),
        };
        let api = ConnectionApi::new(
            ApiConfig {
                api_path,
                connection: ConnectionConfig { cluster_id },
                trust_request_headers,
            },
            backends,
            api_metrics,
        );
        info!("Serving workspace connections");
        let runtime = runtime.spawn_server(api);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background
        // tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

fn signing_key(path: Option<&Path>) -> Result<Vec<u8>> {
    let key = match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read signing key from {}", path.display()))?,
        None => std::env::var(SIGNING_KEY_ENV)
            .with_context(|| {
                format!("{SIGNING_KEY_ENV} must be set when --jwt-signing-key-file is not")
            })?
            .into_bytes(),
    };
    Ok(key.trim_ascii_end().to_vec())
}
