//! Money and address primitives

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// Supported settlement currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Pkr,
}

impl Currency {
    /// ISO 4217 code used on the wire and by the gateway
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Pkr => "PKR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A monetary amount in a single currency
///
/// Amounts are `Decimal`, never floats. Arithmetic across currencies is a
/// caller bug; the order aggregator rejects mixed-currency carts before any
/// sum is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Amount in the gateway's minor unit (e.g. paisa for PKR), rounded
    pub fn minor_units(&self) -> Option<i64> {
        (self.amount * Decimal::from(100)).round().to_i64()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.currency, self.amount)
    }
}

/// Shipping address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl Address {
    /// First required field that is absent, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.street.trim().is_empty() {
            Some("street")
        } else if self.city.trim().is_empty() {
            Some("city")
        } else if self.state.trim().is_empty() {
            Some("state")
        } else if self.zip.trim().is_empty() {
            Some("zip")
        } else if self.country.trim().is_empty() {
            Some("country")
        } else {
            None
        }
    }
}
