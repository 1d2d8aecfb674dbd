//! Application state for the payment service

use std::sync::Arc;

use sqlx::PgPool;

use broker::Broker;

use crate::clients::HttpOrderClient;
use crate::config::Config;
use crate::repository::PgPaymentRepository;
use crate::service::PaymentService;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PaymentService>,
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(config: &Config, pool: PgPool, broker: Arc<Broker>) -> Result<Self, BoxError> {
        let orders = HttpOrderClient::new(&config.order_base_url, config.client_timeout_secs)?;
        let service = Arc::new(PaymentService::new(
            Arc::new(PgPaymentRepository::new(pool)),
            Arc::new(orders),
            broker,
            config.gateway.clone(),
            config.jwt_secret.clone(),
        ));
        Ok(Self {
            service,
            jwt_secret: config.jwt_secret.clone(),
        })
    }
}
