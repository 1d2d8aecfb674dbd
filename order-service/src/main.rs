//! order-service — order aggregation API
//!
//! Assembles orders from the caller's current cart with live product
//! pricing and stock checks, and exposes the guarded order-status
//! transition used by the payment service.

mod aggregator;
mod api;
mod clients;
mod config;
mod repository;
mod state;

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
                .unwrap_or_else(|_| "order_service=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting order-service (env: {})", config.environment);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let state = AppState::new(&config, pool)?;
    let app = api::create_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("order-service listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
