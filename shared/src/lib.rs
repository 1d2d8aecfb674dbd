//! Shared types for the platform services
//!
//! Common types used across the order, payment and notification services:
//! money and address primitives, domain models, event topics and payloads,
//! the unified error type, and JWT auth helpers.

pub mod auth;
pub mod error;
pub mod events;
pub mod models;
pub mod response;
pub mod types;

// Re-exports
pub use error::{AppError, AppResult, ErrorCode};
pub use response::ApiResponse;
pub use types::{Address, Currency, Money};
