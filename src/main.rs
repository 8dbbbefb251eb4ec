use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use intake_connect::crypto::CryptoEngine;
use intake_connect::store::postgres::PgTokenStore;
use intake_connect::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intake_connect=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("intake-connect v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    // Initialize components
    let crypto = Arc::new(CryptoEngine::new(
        &config.master_key,
        &config.hmac_secret,
    )?);
    let store = PgTokenStore::new(&config.database_url, crypto.clone()).await?;
    store.migrate().await?;
    info!("Database connected and migrated ✓");

    // Build shared state
    let state: SharedState = Arc::new(AppState::new(config, Arc::new(store), crypto));
    info!("Registered {} OAuth providers", state.registry.count());

    // Build router
    let app = api::router(state.clone());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
