//! Notification service configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Notification service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// AMQP broker URL
    pub broker_url: String,
    /// Sender address for outgoing mail
    pub email_from: String,
    /// Environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let email_from = match std::env::var("EMAIL_FROM") {
            Ok(v) if !v.is_empty() => v,
            _ if environment == "development" => "noreply@localhost".into(),
            _ => return Err(format!("EMAIL_FROM must be set in {environment} environment").into()),
        };
        Ok(Self {
            broker_url: std::env::var("BROKER_URL")
                .unwrap_or_else(|_| "amqp://localhost:5672/%2f".into()),
            email_from,
            environment,
        })
    }
}
