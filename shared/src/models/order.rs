//! Order model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Address, Money, Timestamp};

/// Order status
///
/// An order leaves PENDING exactly once; CONFIRMED and CANCELLED are
/// terminal. The transition is driven by the payment state machine, never
/// mutated directly by CRUD callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single priced order line
///
/// `unit_price` is the authoritative product price at aggregation time;
/// client-supplied prices are never copied in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Order entity
///
/// Line items are immutable after creation; only `status` changes, and only
/// through the guarded transition path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total_price: Money,
    pub shipping_address: Address,
    pub status: OrderStatus,
    pub created_at: Timestamp,
}

impl Order {
    /// Fresh order id
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}
