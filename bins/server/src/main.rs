//! RagVault API Server
//!
//! Main entry point for the RagVault backend service.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ragvault_api::{AppState, create_router};
use ragvault_db::connect;
use ragvault_shared::AppConfig;

fn init_tracing(json: bool) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragvault=debug,tower_http=debug".into()),
        )
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(config.log.json);

    let db = connect(&config.database)
        .await
        .context("failed to connect to database")?;

    let state = AppState::from_config(&config, db)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, issuer = %config.auth.issuer, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
