//! Payment service configuration

use crate::gateway::GatewayConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Payment service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Base URL of the order service
    pub order_base_url: String,
    /// AMQP broker URL
    pub broker_url: String,
    /// Outbound collaborator call deadline, seconds
    pub client_timeout_secs: u64,
    /// JWT secret shared across services
    pub jwt_secret: String,
    /// Gateway credentials and endpoints
    pub gateway: GatewayConfig,
    /// Environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty outside development
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let gateway = GatewayConfig {
            merchant_id: std::env::var("GATEWAY_MERCHANT_ID").unwrap_or_else(|_| "MC00000".into()),
            password: Self::require_secret("GATEWAY_PASSWORD", &environment)?,
            integrity_salt: Self::require_secret("GATEWAY_INTEGRITY_SALT", &environment)?,
            return_url: std::env::var("GATEWAY_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:3004/api/payments/callback".into()),
            api_url: std::env::var("GATEWAY_API_URL").unwrap_or_else(|_| {
                "https://sandbox.jazzcash.com.pk/CustomerPortal/transactionmanagement/merchantform"
                    .into()
            }),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3004),
            order_base_url: std::env::var("ORDER_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3003".into()),
            broker_url: std::env::var("BROKER_URL")
                .unwrap_or_else(|_| "amqp://localhost:5672/%2f".into()),
            client_timeout_secs: std::env::var("CLIENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            gateway,
            environment,
        })
    }
}
