//! notification-service — event-driven email dispatch
//!
//! No HTTP surface: the service consumes the notification queues and turns
//! each event into an email through the SES transport.

mod config;
mod dispatcher;
mod templates;
mod transport;

use std::sync::Arc;

use config::Config;
use transport::SesMailer;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notification_service=info,broker=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting notification-service (env: {})", config.environment);

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let ses = aws_sdk_sesv2::Client::new(&aws_config);
    let mailer = Arc::new(SesMailer::new(ses, config.email_from.clone()));

    let broker = broker::Broker::new(&config.broker_url);
    // A consumer is useless without the broker, so block until it is up
    broker::connect_with_backoff(&broker, 10).await?;

    let handles = dispatcher::run(&broker, mailer);
    tracing::info!(consumers = handles.len(), "notification dispatch running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}
