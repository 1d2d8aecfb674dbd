//! Application state for the order service

use std::sync::Arc;

use sqlx::PgPool;

use crate::aggregator::OrderAggregator;
use crate::clients::{http_client, HttpCartClient, HttpProductClient};
use crate::config::Config;
use crate::repository::{OrderRepository, PgOrderRepository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<OrderAggregator>,
    pub orders: Arc<dyn OrderRepository>,
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(config: &Config, pool: PgPool) -> Result<Self, BoxError> {
        let client = http_client(config.client_timeout_secs)?;
        let orders: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(pool));
        let aggregator = Arc::new(OrderAggregator::new(
            Arc::new(HttpCartClient::new(client.clone(), &config.cart_base_url)),
            Arc::new(HttpProductClient::new(client, &config.product_base_url)),
            orders.clone(),
        ));
        Ok(Self {
            aggregator,
            orders,
            jwt_secret: config.jwt_secret.clone(),
        })
    }
}
