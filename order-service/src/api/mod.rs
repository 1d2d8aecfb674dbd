//! API routes for the order service

pub mod orders;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the service router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/status", patch(orders::update_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
