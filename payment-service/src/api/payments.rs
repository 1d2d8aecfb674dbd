//! Payment endpoints

use std::collections::BTreeMap;
use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};
use serde::Deserialize;

use shared::auth::{authenticate, bearer_token};
use shared::{ApiResponse, AppError};

use crate::service::{CallbackOutcome, CreatedPayment};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreatePaymentRequest {
    /// Optional wallet account number forwarded to the gateway
    #[serde(default)]
    pub phone: String,
}

/// POST /api/payments/create/{order_id} — initiate a payment for an order
pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    body: Option<Json<CreatePaymentRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedPayment>>), AppError> {
    let claims = authenticate(&headers, &state.jwt_secret)?;
    // authenticate() succeeded, so the header is present
    let bearer = bearer_token(&headers).ok_or_else(AppError::unauthorized)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let created = state
        .service
        .create_payment(&claims, bearer, &order_id, &body.phone)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

/// POST /api/payments/callback — gateway form-encoded callback
///
/// Unauthenticated by design; the secure hash is the authentication. The
/// ordered-map conversion keeps the handler independent of field names the
/// gateway may add later.
pub async fn callback(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Json<ApiResponse<CallbackOutcome>>, AppError> {
    let params: BTreeMap<String, String> = fields.into_iter().collect();
    let outcome = state.service.handle_callback(&params).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
