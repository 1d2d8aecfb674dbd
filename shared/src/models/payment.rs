//! Payment model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Money, Timestamp};

/// Payment status
///
/// PENDING is the only non-terminal state. A payment transitions at most
/// once; a gateway callback naming an already-terminal payment is absorbed
/// as a duplicate delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Complete,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Complete => "COMPLETE",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    GatewayWallet,
    Card,
    CashOnDelivery,
}

/// Payment entity
///
/// References (never owns) an order. The customer contact fields are a
/// snapshot of the authenticated user at creation time and ride along on
/// every payment event so notifications reach a real recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    /// Gateway transaction reference, assigned at creation
    pub transaction_id: String,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub status: PaymentStatus,
    pub customer_email: String,
    pub customer_name: String,
    pub created_at: Timestamp,
}

impl Payment {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Complete.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn method_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::GatewayWallet).unwrap(),
            "\"GATEWAY_WALLET\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"CASH_ON_DELIVERY\""
        );
    }
}
