//! Unified error type for the platform services
//!
//! Every service maps its failures onto [`AppError`], which carries an
//! [`ErrorCode`] (stable code string + HTTP status) and a human-readable
//! message. Axum handlers return `Result<_, AppError>`; the `IntoResponse`
//! impl renders the structured `{code, message}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::response::ApiResponse;

/// Error codes, grouped by domain:
/// - 0xxx: general
/// - 1xxx: auth
/// - 4xxx: order
/// - 5xxx: payment
/// - 9xxx: system / infrastructure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed input
    Validation,
    /// Resource not found
    NotFound,
    /// Resource already exists / conflicting state
    Conflict,
    /// Authentication required or token invalid
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,

    /// Cart has no items
    EmptyCart,
    /// A referenced product could not be fetched
    ProductUnavailable,
    /// Requested quantity exceeds available stock
    InsufficientStock,
    /// Cart lines mix currencies
    CurrencyMismatch,
    /// Shipping address is missing required fields
    InvalidShippingAddress,
    /// Illegal order/payment status transition
    InvalidTransition,

    /// Callback signature did not verify
    SignatureInvalid,

    /// Downstream service returned an error
    CollaboratorUnavailable,
    /// Downstream service did not answer within the deadline
    CollaboratorTimeout,
    /// Message broker unreachable after retries
    BrokerUnavailable,
    /// Database error
    Database,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Stable code string sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "E0001",
            Self::NotFound => "E0002",
            Self::Conflict => "E0003",
            Self::Unauthorized => "E1001",
            Self::Forbidden => "E1002",
            Self::EmptyCart => "E4001",
            Self::ProductUnavailable => "E4002",
            Self::InsufficientStock => "E4003",
            Self::CurrencyMismatch => "E4004",
            Self::InvalidShippingAddress => "E4005",
            Self::InvalidTransition => "E4006",
            Self::SignatureInvalid => "E5001",
            Self::CollaboratorUnavailable => "E9001",
            Self::CollaboratorTimeout => "E9002",
            Self::BrokerUnavailable => "E9003",
            Self::Database => "E9004",
            Self::Internal => "E9005",
        }
    }

    /// HTTP status for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation
            | Self::EmptyCart
            | Self::InvalidShippingAddress
            | Self::CurrencyMismatch => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::SignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict | Self::InvalidTransition => StatusCode::CONFLICT,
            Self::InsufficientStock | Self::ProductUnavailable => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::CollaboratorUnavailable | Self::CollaboratorTimeout => StatusCode::BAD_GATEWAY,
            Self::BrokerUnavailable | Self::Database | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Default message for this error
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Validation => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Conflicting state",
            Self::Unauthorized => "Authentication required",
            Self::Forbidden => "Permission denied",
            Self::EmptyCart => "Cart is empty",
            Self::ProductUnavailable => "Product unavailable",
            Self::InsufficientStock => "Insufficient stock",
            Self::CurrencyMismatch => "Cart lines mix currencies",
            Self::InvalidShippingAddress => "Invalid shipping address",
            Self::InvalidTransition => "Illegal status transition",
            Self::SignatureInvalid => "Signature verification failed",
            Self::CollaboratorUnavailable => "Downstream service unavailable",
            Self::CollaboratorTimeout => "Downstream service timed out",
            Self::BrokerUnavailable => "Message broker unavailable",
            Self::Database => "Database error",
            Self::Internal => "Internal server error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Application error with a structured code and message
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

/// Convenience result alias
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a new error with the default message for the code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.default_message().to_string(),
            code,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    // ==================== Convenience constructors ====================

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Validation, msg)
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::NotFound, format!("{} not found", resource.into()))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Conflict, msg)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Forbidden, msg)
    }

    pub fn empty_cart() -> Self {
        Self::new(ErrorCode::EmptyCart)
    }

    pub fn product_unavailable(product_id: impl Into<String>) -> Self {
        Self::with_message(
            ErrorCode::ProductUnavailable,
            format!("product {} could not be fetched", product_id.into()),
        )
    }

    pub fn insufficient_stock(product_id: impl Into<String>) -> Self {
        Self::with_message(
            ErrorCode::InsufficientStock,
            format!("insufficient stock for product {}", product_id.into()),
        )
    }

    pub fn currency_mismatch() -> Self {
        Self::new(ErrorCode::CurrencyMismatch)
    }

    pub fn invalid_address(field: &str) -> Self {
        Self::with_message(
            ErrorCode::InvalidShippingAddress,
            format!("shipping address is missing required field: {field}"),
        )
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidTransition, msg)
    }

    pub fn signature_invalid() -> Self {
        Self::new(ErrorCode::SignatureInvalid)
    }

    pub fn collaborator_unavailable(service: &str) -> Self {
        Self::with_message(
            ErrorCode::CollaboratorUnavailable,
            format!("{service} service unavailable"),
        )
    }

    pub fn collaborator_timeout(service: &str) -> Self {
        Self::with_message(
            ErrorCode::CollaboratorTimeout,
            format!("{service} service timed out"),
        )
    }

    pub fn broker_unavailable(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::BrokerUnavailable, msg)
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Database, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Internal, msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.http_status();
        if status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        }
        let body = ApiResponse::<()>::error(self.code.code(), self.message);
        (status, Json(body)).into_response()
    }
}
