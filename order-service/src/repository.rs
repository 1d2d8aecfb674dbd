//! Order persistence
//!
//! Orders live in an external document store; this module is the narrow
//! contract over it. The Postgres adapter keeps the whole order as a JSONB
//! document plus a status column used for guarded transitions.

use async_trait::async_trait;
use sqlx::PgPool;

use shared::models::{Order, OrderStatus};
use shared::AppError;

/// Order store contract
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new order (single atomic commit at the end of aggregation)
    async fn insert(&self, order: &Order) -> Result<(), AppError>;

    async fn find(&self, id: &str) -> Result<Option<Order>, AppError>;

    /// Guarded status update: applies only while the current status is
    /// `from`. Returns whether a row transitioned, so terminal states never
    /// regress even under concurrent callers.
    async fn update_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, AppError>;
}

/// Postgres adapter
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), AppError> {
        let doc = serde_json::to_value(order)
            .map_err(|e| AppError::internal(format!("order serialization failed: {e}")))?;
        sqlx::query(
            "INSERT INTO orders (id, user_id, status, doc, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.status.as_str())
        .bind(&doc)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Order>, AppError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT doc FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::database(e.to_string()))?;
        match row {
            None => Ok(None),
            Some((doc,)) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| AppError::internal(format!("stored order is malformed: {e}"))),
        }
    }

    async fn update_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE orders
             SET status = $3, doc = jsonb_set(doc, '{status}', to_jsonb($3::text))
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory adapter used by tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: std::sync::RwLock<std::collections::HashMap<String, Order>>,
}

#[cfg(test)]
impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), AppError> {
        self.orders
            .write()
            .unwrap()
            .insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Order>, AppError> {
        Ok(self.orders.read().unwrap().get(id).cloned())
    }

    async fn update_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, AppError> {
        let mut orders = self.orders.write().unwrap();
        match orders.get_mut(id) {
            Some(order) if order.status == from => {
                order.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
