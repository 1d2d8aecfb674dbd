//! API routes for the payment service

pub mod payments;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the service router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/payments/create/{order_id}",
            post(payments::create_payment),
        )
        .route("/api/payments/callback", post(payments::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
