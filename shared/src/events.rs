//! Event topics and payloads
//!
//! Queue names are the literal topic strings; bodies are UTF-8 JSON of the
//! payload structs below. The broker is the system of record for in-flight
//! delivery; none of these are persisted by the services.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Currency;

/// Topic (= durable queue) names
pub mod topics {
    pub const USER_CREATED: &str = "AUTH_NOTIFICATION.USER_CREATED";
    pub const PAYMENT_INITIATED: &str = "PAYMENT_NOTIFICATION.PAYMENT_INITIATED";
    pub const PAYMENT_COMPLETED: &str = "PAYMENT_NOTIFICATION.PAYMENT_COMPLETED";
    pub const PAYMENT_FAILED: &str = "PAYMENT_NOTIFICATION.PAYMENT_FAILED";
    pub const PRODUCT_CREATED: &str = "PRODUCT_NOTIFICATION.PRODUCT_CREATED";

    /// Topics the notification dispatcher consumes
    pub const ALL: [&str; 5] = [
        USER_CREATED,
        PAYMENT_INITIATED,
        PAYMENT_COMPLETED,
        PAYMENT_FAILED,
        PRODUCT_CREATED,
    ];
}

/// Published when a user account is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreatedEvent {
    pub email: String,
    pub username: String,
}

/// Published on payment initiation and on every terminal payment transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub payment_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub email: String,
    pub username: String,
}

/// Published when a product is added to the catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreatedEvent {
    pub product_id: String,
    pub title: String,
    pub email: String,
    pub username: String,
}
