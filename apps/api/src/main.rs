mod agents;
mod config;
mod db;
mod errors;
mod extraction;
mod profiles;
mod provisioning;
mod routes;
mod secrets;
mod session;
mod state;
mod storage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agents::elevenlabs::ElevenLabsProvider;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::extraction::fallback::LocalFallback;
use crate::extraction::gemini::GeminiExtractor;
use crate::extraction::DocumentExtractor;
use crate::profiles::store::{PgProfileStore, ProfileStore};
use crate::provisioning::{Collaborators, Provisioner, Settings};
use crate::routes::build_router;
use crate::secrets::PgSecretStore;
use crate::session::HttpIdentityVerifier;
use crate::state::AppState;
use crate::storage::S3ResumeArchive;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PersonAI API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // One HTTP client shared by every outbound adapter
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    // The remote gets three quarters of the extraction budget; the rest is for the local pass.
    let extractor: Arc<dyn DocumentExtractor> = Arc::new(LocalFallback::new(
        GeminiExtractor::new(
            http.clone(),
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        ),
        config.extraction_timeout * 3 / 4,
    ));
    info!("Document extractor initialized (model: {})", config.gemini_model);

    let profiles: Arc<dyn ProfileStore> = Arc::new(PgProfileStore::new(db.clone()));

    let provisioner = Provisioner::new(
        Collaborators {
            extractor: extractor.clone(),
            agents: Arc::new(ElevenLabsProvider::new(
                http.clone(),
                config.agent_api_url.clone(),
            )),
            profiles: profiles.clone(),
            secrets: Arc::new(PgSecretStore::new(db.clone())),
            archive: Arc::new(S3ResumeArchive::new(s3, config.s3_bucket.clone())),
        },
        Settings {
            policy: config.agent_failure_policy,
            extraction_timeout: config.extraction_timeout,
            agent_timeout: config.agent_timeout,
            agent_app_url: config.agent_app_url.clone(),
        },
    );
    info!(
        "Provisioner initialized (agent failure policy: {:?})",
        config.agent_failure_policy
    );

    // Build app state
    let state = AppState {
        identity: Arc::new(HttpIdentityVerifier::new(
            http,
            config.auth_url.clone(),
            config.auth_anon_key.clone(),
        )),
        extractor,
        profiles,
        provisioner: Arc::new(provisioner),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        config.aws_secret_access_key.expose_secret(),
        None,
        None,
        "personai-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
