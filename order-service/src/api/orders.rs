//! Order endpoints

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use shared::auth::{authenticate, bearer_token, Claims};
use shared::models::{Order, OrderStatus};
use shared::{Address, ApiResponse, AppError};

use crate::repository::OrderRepository;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: Address,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// POST /api/orders — assemble an order from the caller's current cart
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), AppError> {
    let claims = authenticate(&headers, &state.jwt_secret)?;
    // authenticate() succeeded, so the header is present
    let bearer = bearer_token(&headers).ok_or_else(AppError::unauthorized)?;

    let order = state
        .aggregator
        .create_order(&claims, bearer, body.shipping_address)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(order))))
}

/// GET /api/orders/{id} — owner or internal service only
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let claims = authenticate(&headers, &state.jwt_secret)?;
    let order = state
        .orders
        .find(&id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    authorize_order_access(&claims, &order)?;
    Ok(Json(ApiResponse::ok(order)))
}

/// PATCH /api/orders/{id}/status — state-machine-guarded transition
///
/// Driven by the payment service; end users cannot move an order out of
/// PENDING themselves.
pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let claims = authenticate(&headers, &state.jwt_secret)?;
    if !claims.is_service() && claims.role != "admin" {
        return Err(AppError::forbidden("order status is service-managed"));
    }

    let order = transition_order(state.orders.as_ref(), &id, body.status).await?;
    Ok(Json(ApiResponse::ok(order)))
}

fn authorize_order_access(claims: &Claims, order: &Order) -> Result<(), AppError> {
    if claims.is_service() || claims.role == "admin" || claims.sub == order.user_id {
        Ok(())
    } else {
        Err(AppError::forbidden("not the order owner"))
    }
}

/// Apply a guarded status transition; a repeat of an already-applied
/// transition is an idempotent no-op
async fn transition_order(
    orders: &dyn OrderRepository,
    id: &str,
    target: OrderStatus,
) -> Result<Order, AppError> {
    let order = orders
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;

    if order.status == target {
        return Ok(order);
    }
    if !order.status.can_transition_to(target) {
        return Err(AppError::invalid_transition(format!(
            "cannot move order from {} to {}",
            order.status, target
        )));
    }
    if !orders.update_status(id, order.status, target).await? {
        // Raced with another transition; re-read would show a terminal state
        return Err(AppError::invalid_transition(
            "order status changed concurrently",
        ));
    }
    tracing::info!(order_id = %id, from = %order.status, to = %target, "order status updated");
    orders
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use shared::{Currency, ErrorCode, Money};

    use crate::repository::MemoryOrderRepository;

    fn pending_order(id: &str) -> Order {
        let money = |amount: i64| Money::new(Decimal::from(amount), Currency::Pkr);
        Order {
            id: id.to_string(),
            user_id: "u1".into(),
            lines: vec![],
            subtotal: money(400),
            tax: money(20),
            shipping: money(150),
            total_price: money(570),
            shipping_address: Address {
                street: "123 Main St".into(),
                city: "Metropolis".into(),
                state: "CA".into(),
                zip: "90210".into(),
                country: "USA".into(),
            },
            status: OrderStatus::Pending,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    #[tokio::test]
    async fn pending_order_confirms_once() {
        let repo = Arc::new(MemoryOrderRepository::new());
        repo.insert(&pending_order("o1")).await.unwrap();

        let order = transition_order(repo.as_ref(), "o1", OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        // Repeating the same transition is a no-op, not an error
        let order = transition_order(repo.as_ref(), "o1", OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn terminal_order_never_regresses() {
        let repo = Arc::new(MemoryOrderRepository::new());
        repo.insert(&pending_order("o1")).await.unwrap();
        transition_order(repo.as_ref(), "o1", OrderStatus::Cancelled)
            .await
            .unwrap();

        let err = transition_order(repo.as_ref(), "o1", OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let repo = MemoryOrderRepository::new();
        let err = transition_order(&repo, "ghost", OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
