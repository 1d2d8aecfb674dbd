//! Payment orchestration and the payment/order state machine
//!
//! A payment leaves PENDING at most once. Transitions are guarded on the
//! current state (not upserts), so duplicate gateway callbacks for an
//! already-terminal transaction are absorbed as no-ops and never re-publish
//! events. On COMPLETE the completed event is published first and the order
//! confirmation follows; a failed order update leaves the payment COMPLETE
//! (financial truth is authoritative) and is logged for reconciliation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use broker::Publisher;
use shared::auth::{service_token, Claims};
use shared::events::{topics, PaymentEvent};
use shared::models::{OrderStatus, Payment, PaymentMethod, PaymentStatus};
use shared::AppError;

use crate::clients::OrderClient;
use crate::gateway::{self, GatewayConfig};
use crate::repository::PaymentRepository;

/// Result of processing a gateway callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackOutcome {
    /// Payment transitioned to COMPLETE
    Completed,
    /// Payment transitioned to FAILED
    Failed,
    /// Gateway reported a non-terminal code; payment stays PENDING
    Pending,
    /// Redelivery of a callback for an already-terminal payment
    Duplicate,
}

/// Response to payment initiation
#[derive(Debug, Serialize)]
pub struct CreatedPayment {
    pub payment: Payment,
    /// Gateway form submission URL
    pub gateway_url: String,
    /// Signed parameter set to submit
    pub params: BTreeMap<String, String>,
    /// True when the initiation event could not be published after retries
    pub notifications_degraded: bool,
}

/// Payment orchestration service
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    orders: Arc<dyn OrderClient>,
    publisher: Arc<dyn Publisher>,
    gateway: GatewayConfig,
    jwt_secret: String,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        orders: Arc<dyn OrderClient>,
        publisher: Arc<dyn Publisher>,
        gateway: GatewayConfig,
        jwt_secret: String,
    ) -> Self {
        Self {
            payments,
            orders,
            publisher,
            gateway,
            jwt_secret,
        }
    }

    /// Initiate a payment for a PENDING order owned by the caller
    pub async fn create_payment(
        &self,
        claims: &Claims,
        bearer: &str,
        order_id: &str,
        customer_phone: &str,
    ) -> Result<CreatedPayment, AppError> {
        let order = self
            .orders
            .get_order(order_id, bearer)
            .await
            .map_err(|e| e.into_app_error("order"))?;

        if order.user_id != claims.sub {
            return Err(AppError::forbidden("not the order owner"));
        }
        if order.status != OrderStatus::Pending {
            return Err(AppError::invalid_transition(format!(
                "order is {}, only PENDING orders are payable",
                order.status
            )));
        }
        if self.payments.find_pending_by_order(order_id).await?.is_some() {
            return Err(AppError::conflict("a payment for this order is already in flight"));
        }

        let request = gateway::create_payment_request(
            &self.gateway,
            order_id,
            &order.total_price,
            &claims.email,
            customer_phone,
        )?;

        let payment = Payment {
            id: Payment::new_id(),
            order_id: order_id.to_string(),
            user_id: claims.sub.clone(),
            amount: order.total_price,
            payment_method: PaymentMethod::GatewayWallet,
            transaction_id: request.transaction_id.clone(),
            response_code: None,
            response_message: None,
            status: PaymentStatus::Pending,
            customer_email: claims.email.clone(),
            customer_name: claims.username.clone(),
            created_at: Utc::now().timestamp_millis(),
        };
        self.payments.insert(&payment).await?;
        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            transaction_id = %payment.transaction_id,
            "payment initiated"
        );

        let notifications_degraded = self
            .publish_payment_event(topics::PAYMENT_INITIATED, &payment)
            .await
            .is_err();

        Ok(CreatedPayment {
            payment,
            gateway_url: request.gateway_url,
            params: request.params,
            notifications_degraded,
        })
    }

    /// Process a gateway callback
    ///
    /// The signature is verified before any state is touched; an invalid
    /// signature is logged as a potential security event and rejected.
    pub async fn handle_callback(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<CallbackOutcome, AppError> {
        if let Err(err) = gateway::verify_callback(params, &self.gateway.integrity_salt) {
            tracing::warn!(
                txn = params.get("pp_TxnRefNo").map(String::as_str).unwrap_or("?"),
                "callback signature verification failed; possible tampering"
            );
            return Err(err);
        }

        let transaction_id = params
            .get("pp_TxnRefNo")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::validation("callback is missing pp_TxnRefNo"))?;
        let response_code = params.get("pp_ResponseCode").cloned().unwrap_or_default();
        let response_message = params
            .get("pp_ResponseMessage")
            .cloned()
            .unwrap_or_default();

        let payment = self
            .payments
            .find_by_transaction(transaction_id)
            .await?
            .ok_or_else(|| AppError::not_found("payment"))?;

        // Duplicate-delivery no-op: terminal states never regress
        if payment.status.is_terminal() {
            tracing::info!(
                transaction_id,
                status = %payment.status,
                "duplicate callback for terminal payment, ignoring"
            );
            return Ok(CallbackOutcome::Duplicate);
        }

        match gateway::map_response_code(&response_code) {
            PaymentStatus::Pending => {
                self.payments
                    .record_response(transaction_id, &response_code, &response_message)
                    .await?;
                tracing::info!(transaction_id, response_code, "payment still pending at gateway");
                Ok(CallbackOutcome::Pending)
            }
            PaymentStatus::Complete => {
                let applied = self
                    .payments
                    .transition(
                        transaction_id,
                        PaymentStatus::Complete,
                        &response_code,
                        &response_message,
                    )
                    .await?;
                if !applied {
                    return Ok(CallbackOutcome::Duplicate);
                }
                tracing::info!(transaction_id, "payment complete");

                if self
                    .publish_payment_event(topics::PAYMENT_COMPLETED, &payment)
                    .await
                    .is_err()
                {
                    tracing::error!(
                        transaction_id,
                        "payment-completed event lost; needs reconciliation"
                    );
                }
                self.confirm_order(&payment).await;
                Ok(CallbackOutcome::Completed)
            }
            PaymentStatus::Failed => {
                let applied = self
                    .payments
                    .transition(
                        transaction_id,
                        PaymentStatus::Failed,
                        &response_code,
                        &response_message,
                    )
                    .await?;
                if !applied {
                    return Ok(CallbackOutcome::Duplicate);
                }
                tracing::info!(transaction_id, response_code, "payment failed");

                if self
                    .publish_payment_event(topics::PAYMENT_FAILED, &payment)
                    .await
                    .is_err()
                {
                    tracing::error!(transaction_id, "payment-failed event lost");
                }
                // Order stays PENDING; the caller may retry payment
                Ok(CallbackOutcome::Failed)
            }
        }
    }

    /// Confirm the order after a completed payment
    ///
    /// A failure here never rolls the payment back; the mismatch is logged
    /// as a reconciliation task.
    async fn confirm_order(&self, payment: &Payment) {
        let token = match service_token("payment-service", &self.jwt_secret) {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(
                    order_id = %payment.order_id,
                    error = %err,
                    "could not sign service token; order confirmation needs reconciliation"
                );
                return;
            }
        };
        if let Err(err) = self
            .orders
            .update_status(&payment.order_id, OrderStatus::Confirmed, &token)
            .await
        {
            tracing::warn!(
                order_id = %payment.order_id,
                payment_id = %payment.id,
                error = %err,
                "order confirmation failed after completed payment; needs reconciliation"
            );
        }
    }

    async fn publish_payment_event(
        &self,
        topic: &str,
        payment: &Payment,
    ) -> Result<(), broker::BrokerError> {
        let event = PaymentEvent {
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            amount: payment.amount.amount,
            currency: payment.amount.currency,
            email: payment.customer_email.clone(),
            username: payment.customer_name.clone(),
        };
        let value = serde_json::to_value(&event)?;
        let result = self.publisher.publish_json(topic, value).await;
        if let Err(err) = &result {
            tracing::error!(topic, error = %err, "event publish failed");
        }
        result
    }
}
