//! HTTP clients for the cart and product collaborators
//!
//! Narrow trait seams so the aggregator is testable with substitutable
//! fakes; the reqwest implementations apply a bounded timeout and forward
//! the caller's bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use shared::{AppError, Money};

/// Collaborator call failure
#[derive(Debug, Error)]
pub enum ClientError {
    /// The collaborator did not answer within the deadline
    #[error("request timed out")]
    Timeout,
    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("transport error: {0}")]
    Transport(String),
    /// Collaborator answered with a non-success status
    #[error("unexpected status {0}")]
    Status(u16),
    /// Response body did not match the contract
    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl ClientError {
    /// Map onto the API error taxonomy, naming the collaborator
    pub fn into_app_error(self, service: &str) -> AppError {
        match self {
            ClientError::Timeout => AppError::collaborator_timeout(service),
            _ => AppError::collaborator_unavailable(service),
        }
    }
}

/// One cart line as the cart service reports it (unpriced)
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
}

/// The user's current cart
#[derive(Debug, Clone, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

/// Authoritative product data: live price and stock
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInfo {
    pub id: String,
    pub title: String,
    pub price: Money,
    pub stock: u32,
}

/// Cart collaborator: `GET /api/cart` (authenticated)
#[async_trait]
pub trait CartClient: Send + Sync {
    async fn current_cart(&self, bearer: &str) -> Result<Cart, ClientError>;
}

/// Product collaborator: `GET /api/products/{id}`
#[async_trait]
pub trait ProductClient: Send + Sync {
    async fn product(&self, product_id: &str) -> Result<ProductInfo, ClientError>;
}

/// Shared reqwest client with the configured deadline
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ClientError::Transport(e.to_string()))
}

/// HTTP implementation of [`CartClient`]
#[derive(Debug, Clone)]
pub struct HttpCartClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCartClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct CartEnvelope {
    cart: Cart,
}

#[async_trait]
impl CartClient for HttpCartClient {
    async fn current_cart(&self, bearer: &str) -> Result<Cart, ClientError> {
        let url = format!("{}/api/cart", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let envelope: CartEnvelope = response.json().await?;
        Ok(envelope.cart)
    }
}

/// HTTP implementation of [`ProductClient`]
#[derive(Debug, Clone)]
pub struct HttpProductClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProductClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct ProductEnvelope {
    data: ProductInfo,
}

#[async_trait]
impl ProductClient for HttpProductClient {
    async fn product(&self, product_id: &str) -> Result<ProductInfo, ClientError> {
        let url = format!(
            "{}/api/products/{}",
            self.base_url.trim_end_matches('/'),
            product_id
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let envelope: ProductEnvelope = response.json().await?;
        Ok(envelope.data)
    }
}
