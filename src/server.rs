pub mod errors;
pub mod extract;
pub mod handlers;

use std::{net::TcpListener, sync::Arc};

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use axum_server::tls_openssl::{OpenSSLAcceptor, OpenSSLConfig};
use color_eyre::eyre::{Context, Result, eyre};
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::{ServerConfig, TlsConfig},
    domain::enrollment::EnrollmentEngine,
};
use handlers::{enrollment, health::health_check, issuance};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EnrollmentEngine>,
}

pub struct Server {
    router: Router,
    config: ServerConfig,
}

impl Server {
    pub fn new(engine: Arc<EnrollmentEngine>, config: ServerConfig) -> Self {
        Self {
            router: router(AppState { engine }),
            config,
        }
    }

    /// Binds the listener and serves in the background, returning the bound port.
    pub async fn run_with_port(self) -> Result<(u16, tokio::task::JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).context("Binding TCP listener")?;
        listener
            .set_nonblocking(true)
            .context("Setting non-blocking mode")?;
        let bound_port = listener
            .local_addr()
            .context("Getting local address")?
            .port();
        let service = self.router.into_make_service();

        let handle = match &self.config.tls {
            Some(tls) => {
                let tls_config = load_tls_config(tls).context("Loading TLS configuration")?;
                tracing::info!(
                    "Server listening on https://{}:{}",
                    self.config.host,
                    bound_port
                );
                let server = axum_server::from_tcp(listener)
                    .acceptor(OpenSSLAcceptor::new(tls_config))
                    .serve(service);
                tokio::spawn(async move {
                    if let Err(e) = server.await {
                        tracing::error!("Server error: {:?}", e);
                    }
                })
            }
            None => {
                tracing::info!(
                    "Server listening on http://{}:{}",
                    self.config.host,
                    bound_port
                );
                let server = axum_server::from_tcp(listener).serve(service);
                tokio::spawn(async move {
                    if let Err(e) = server.await {
                        tracing::error!("Server error: {:?}", e);
                    }
                })
            }
        };

        Ok((bound_port, handle))
    }

    pub async fn run(self) -> Result<()> {
        let (_, handle) = self.run_with_port().await?;
        handle
            .await
            .map_err(|e| eyre!("Server task failed: {:?}", e))
            .context("Running server task")?;
        Ok(())
    }
}

/// Loads the PEM certificate chain and private key into an OpenSSL acceptor.
fn load_tls_config(tls: &TlsConfig) -> Result<OpenSSLConfig> {
    tracing::debug!("Loading TLS certificate from: {}", tls.cert_path.display());
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())
        .map_err(|e| eyre!("Failed to create TLS acceptor: {e}"))?;
    acceptor
        .set_certificate_chain_file(&tls.cert_path)
        .map_err(|e| eyre!("Failed to read certificate chain: {e}"))?;
    tracing::debug!("Loading private key from: {}", tls.key_path.display());
    acceptor
        .set_private_key_file(&tls.key_path, SslFiletype::PEM)
        .map_err(|e| eyre!("Failed to read private key: {e}"))?;
    acceptor
        .check_private_key()
        .map_err(|e| eyre!("Private key does not match the certificate: {e}"))?;

    OpenSSLConfig::try_from(acceptor).map_err(|e| eyre!("Invalid TLS configuration: {e}"))
}

/// Builds the REST surface over the enrollment engine.
pub fn router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
            let uri = request.uri().path().to_string();
            tracing::info_span!("request", method = %request.method(), uri)
        });

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health_check))
        .route("/v2/passport/start", get(enrollment::start))
        .route("/v2/dl/start", get(enrollment::start))
        .route(
            "/v2/passport/verify-document",
            post(enrollment::verify_passport),
        )
        .route("/v2/dl/verify-document", post(enrollment::verify_licence))
        .route("/v2/issue/credential-list", post(issuance::credential_list))
        .route("/v2/issue/{credential}/start", post(issuance::start))
        .route("/v2/issue/{credential}/finish", post(issuance::finish))
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(state)
}
