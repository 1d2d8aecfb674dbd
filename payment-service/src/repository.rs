//! Payment persistence
//!
//! Same document-store contract as the order repository: JSONB document plus
//! a status column so the PENDING→terminal transition is guarded at the
//! store level as well as by the state machine.

use async_trait::async_trait;
use sqlx::PgPool;

use shared::models::{Payment, PaymentStatus};
use shared::AppError;

/// Payment store contract
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError>;

    async fn find_by_transaction(&self, transaction_id: &str)
        -> Result<Option<Payment>, AppError>;

    /// The active (PENDING) payment for an order, if any
    async fn find_pending_by_order(&self, order_id: &str) -> Result<Option<Payment>, AppError>;

    /// Guarded terminal transition: applies only while the payment is
    /// PENDING. Returns whether a row transitioned; a false result means a
    /// duplicate or raced delivery.
    async fn transition(
        &self,
        transaction_id: &str,
        to: PaymentStatus,
        response_code: &str,
        response_message: &str,
    ) -> Result<bool, AppError>;

    /// Record a gateway response without a status change (pending codes)
    async fn record_response(
        &self,
        transaction_id: &str,
        response_code: &str,
        response_message: &str,
    ) -> Result<(), AppError>;
}

/// Postgres adapter
#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError> {
        let doc = serde_json::to_value(payment)
            .map_err(|e| AppError::internal(format!("payment serialization failed: {e}")))?;
        sqlx::query(
            "INSERT INTO payments (id, order_id, user_id, transaction_id, status, doc, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(&payment.user_id)
        .bind(&payment.transaction_id)
        .bind(payment.status.as_str())
        .bind(&doc)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Partial unique index on (order_id) WHERE status = 'PENDING'
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::conflict("a payment for this order is already in flight")
            } else {
                AppError::database(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT doc FROM payments WHERE transaction_id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::database(e.to_string()))?;
        match row {
            None => Ok(None),
            Some((doc,)) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| AppError::internal(format!("stored payment is malformed: {e}"))),
        }
    }

    async fn find_pending_by_order(&self, order_id: &str) -> Result<Option<Payment>, AppError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT doc FROM payments WHERE order_id = $1 AND status = 'PENDING' LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
        match row {
            None => Ok(None),
            Some((doc,)) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| AppError::internal(format!("stored payment is malformed: {e}"))),
        }
    }

    async fn transition(
        &self,
        transaction_id: &str,
        to: PaymentStatus,
        response_code: &str,
        response_message: &str,
    ) -> Result<bool, AppError> {
        // jsonb_set chain keeps the document in sync with the status column
        let result = sqlx::query(
            "UPDATE payments
             SET status = $2,
                 doc = jsonb_set(jsonb_set(jsonb_set(doc,
                           '{status}', to_jsonb($2::text)),
                           '{response_code}', to_jsonb($3::text)),
                           '{response_message}', to_jsonb($4::text))
             WHERE transaction_id = $1 AND status = 'PENDING'",
        )
            .bind(transaction_id)
            .bind(to.as_str())
            .bind(response_code)
            .bind(response_message)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_response(
        &self,
        transaction_id: &str,
        response_code: &str,
        response_message: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE payments
             SET doc = jsonb_set(jsonb_set(doc,
                           '{response_code}', to_jsonb($2::text)),
                           '{response_message}', to_jsonb($3::text))
             WHERE transaction_id = $1",
        )
            .bind(transaction_id)
            .bind(response_code)
            .bind(response_message)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        Ok(())
    }
}

/// In-memory adapter used by tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryPaymentRepository {
    payments: std::sync::RwLock<Vec<Payment>>,
}

#[cfg(test)]
impl MemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl PaymentRepository for MemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError> {
        let mut payments = self.payments.write().unwrap();
        // Same guard as the store's partial unique index
        if payment.status == PaymentStatus::Pending
            && payments
                .iter()
                .any(|p| p.order_id == payment.order_id && p.status == PaymentStatus::Pending)
        {
            return Err(AppError::conflict(
                "a payment for this order is already in flight",
            ));
        }
        payments.push(payment.clone());
        Ok(())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        Ok(self
            .payments
            .read()
            .unwrap()
            .iter()
            .find(|p| p.transaction_id == transaction_id)
            .cloned())
    }

    async fn find_pending_by_order(&self, order_id: &str) -> Result<Option<Payment>, AppError> {
        Ok(self
            .payments
            .read()
            .unwrap()
            .iter()
            .find(|p| p.order_id == order_id && p.status == PaymentStatus::Pending)
            .cloned())
    }

    async fn transition(
        &self,
        transaction_id: &str,
        to: PaymentStatus,
        response_code: &str,
        response_message: &str,
    ) -> Result<bool, AppError> {
        let mut payments = self.payments.write().unwrap();
        match payments
            .iter_mut()
            .find(|p| p.transaction_id == transaction_id)
        {
            Some(p) if p.status == PaymentStatus::Pending => {
                p.status = to;
                p.response_code = Some(response_code.to_string());
                p.response_message = Some(response_message.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_response(
        &self,
        transaction_id: &str,
        response_code: &str,
        response_message: &str,
    ) -> Result<(), AppError> {
        let mut payments = self.payments.write().unwrap();
        if let Some(p) = payments
            .iter_mut()
            .find(|p| p.transaction_id == transaction_id)
        {
            p.response_code = Some(response_code.to_string());
            p.response_message = Some(response_message.to_string());
        }
        Ok(())
    }
}
