//! payment-service — gateway payment orchestration
//!
//! Signs gateway requests, processes signed callbacks through the
//! payment/order state machine, and emits payment lifecycle events.

mod api;
mod clients;
mod config;
mod gateway;
mod repository;
mod service;
mod state;

use std::sync::Arc;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payment_service=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting payment-service (env: {})", config.environment);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let broker = broker::Broker::new(&config.broker_url);
    // Publishing reconnects lazily; a cold broker at boot is only a warning
    if let Err(err) = broker.connect().await {
        tracing::warn!(error = %err, "broker not reachable at startup, will retry on publish");
    }

    let state = AppState::new(&config, pool, Arc::clone(&broker))?;
    let app = api::create_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("payment-service listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
