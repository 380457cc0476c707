//! Wallet-Billing Service - HTTP API for wallets, plans and subscriptions
//!
//! This is the main entry point for the wallet-billing service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_billing_service::{create_router, AppState, ServiceConfig};
use wallet_billing_store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wallet_billing=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Wallet-Billing Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_configured = %config.database_url.is_some(),
        razorpay_configured = %config.razorpay_configured(),
        currency = %config.currency,
        "Service configuration loaded"
    );

    let store = open_store(&config).await?;

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connect to `PostgreSQL` when configured, otherwise fall back to memory.
async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set - using in-memory store, data will not persist");
        return Ok(Arc::new(MemoryStore::new()));
    };

    tracing::info!(
        max_connections = config.database_max_connections,
        "Connecting to PostgreSQL"
    );
    let store = PgStore::connect(url, config.database_max_connections).await?;

    if config.run_migrations {
        tracing::info!("Applying database migrations");
        store.migrate().await?;
    }
    store.verify_schema().await?;

    Ok(Arc::new(store))
}
