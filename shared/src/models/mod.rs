//! Domain models shared across services

pub mod order;
pub mod payment;

pub use order::{Order, OrderLine, OrderStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
