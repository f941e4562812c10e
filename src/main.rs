//! Authgate server binary

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use authgate::api::{create_router, AppState};
use authgate::auth::firebase::build_http_client;
use authgate::auth::FirebaseVerifier;
use authgate::config::{AppConfig, LogFormat};
use authgate::provider::{resolve_project, FirestoreClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    config.validate().context("invalid configuration")?;

    // Provider bootstrap; any failure here aborts startup
    let project = resolve_project(&config.identity)
        .context("failed to resolve identity provider project")?;

    let http = build_http_client(config.identity.timeout_secs)
        .context("failed to build identity provider HTTP client")?;
    let verifier = FirebaseVerifier::new(
        http,
        &config.identity.endpoint,
        config.identity.api_key.clone(),
    );
    let firestore = FirestoreClient::new(&project)
        .context("failed to construct database client")?;

    let settings = config.settings();
    tracing::info!(
        app = %settings.app_name,
        env = %settings.env,
        project_id = %project.project_id,
        frontend_url = %settings.frontend_url,
        "Starting Authgate",
    );

    let state = AppState::new(settings, Arc::new(verifier)).with_firestore(firestore);
    let router = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, "Listening for HTTP traffic");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("authgate=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
