//! HTTP client for the order collaborator

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use shared::models::{Order, OrderStatus};
use shared::{ApiResponse, AppError};

/// Collaborator call failure
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
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
    pub fn into_app_error(self, service: &str) -> AppError {
        match self {
            ClientError::Timeout => AppError::collaborator_timeout(service),
            ClientError::Status(404) => AppError::not_found(service),
            _ => AppError::collaborator_unavailable(service),
        }
    }
}

/// Order collaborator: `GET /api/orders/{id}` and the status PATCH
#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn get_order(&self, order_id: &str, bearer: &str) -> Result<Order, ClientError>;

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        bearer: &str,
    ) -> Result<(), ClientError>;
}

/// HTTP implementation of [`OrderClient`]
#[derive(Debug, Clone)]
pub struct HttpOrderClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl OrderClient for HttpOrderClient {
    async fn get_order(&self, order_id: &str, bearer: &str) -> Result<Order, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("api/orders/{order_id}")))
            .bearer_auth(bearer)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let envelope: ApiResponse<Order> = response.json().await?;
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("order response had no data".into()))
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        bearer: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .patch(self.url(&format!("api/orders/{order_id}/status")))
            .bearer_auth(bearer)
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        let code = response.status();
        if !code.is_success() {
            return Err(ClientError::Status(code.as_u16()));
        }
        Ok(())
    }
}
