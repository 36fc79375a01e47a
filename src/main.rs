use std::sync::Arc;

use color_eyre::eyre::Context;
use enrollment_server::{
    adapters::{
        ApiServerClient, HttpDocumentVerifier, HttpIdemixIssuer, Rs256Signer, UnsignedJwt,
        build_client,
    },
    config::Config,
    domain::enrollment::{AttributeDeriver, EnrollmentEngine, ports::JwtSigner},
    server::Server,
    session::{ExpiredDeletion, MemoryStore, SessionManager},
    telemetry,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let client = build_client(config.upstream_timeout()).context("Building HTTP client")?;

    let signer: Arc<dyn JwtSigner> = match &config.issuing_server.jwt_private_key {
        Some(path) if config.issuing_server.sign_jwts => {
            Arc::new(Rs256Signer::from_file(path).context("Loading JWT signing key")?)
        }
        _ => {
            tracing::warn!("Issuing requests are sent unsigned");
            Arc::new(UnsignedJwt)
        }
    };

    let store = MemoryStore::new();
    let sessions = SessionManager::new(store.clone())
        .with_expiry(config.session.expiry())
        .with_max_sessions(config.session.max_sessions);

    // Sweep sessions abandoned by their clients
    let cleanup_interval = config.session.cleanup_interval();
    tokio::spawn(async move {
        if let Err(e) = store.delete_expired_sessions(cleanup_interval).await {
            tracing::error!("Session cleanup stopped: {e}");
        }
    });

    let engine = EnrollmentEngine::new(
        sessions,
        AttributeDeriver::new(
            &config.credentials.scheme_manager,
            &config.credentials.issuer,
        ),
        Arc::new(HttpDocumentVerifier::new(client.clone(), &config.verifier.url)),
        Arc::new(HttpIdemixIssuer::new(client.clone(), &config.issuer.url)),
        Arc::new(ApiServerClient::new(
            client,
            &config.issuing_server.url,
            &config.issuing_server.api_name,
            signer,
        )),
    )
    .with_upstream_timeout(config.upstream_timeout());

    Server::new(Arc::new(engine), config.server.clone())
        .run()
        .await
}
