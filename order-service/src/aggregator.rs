//! Order aggregation
//!
//! Builds an order from the user's current cart: fetches live product data,
//! prices every line from the authoritative product price (client-supplied
//! prices are never trusted), checks stock atomically, and persists the
//! order in PENDING status with a single insert at the very end — no
//! partial order survives any earlier failure.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use shared::auth::Claims;
use shared::models::{Order, OrderLine, OrderStatus};
use shared::{Address, AppError, Currency, Money};

use crate::clients::{CartClient, ProductClient};
use crate::repository::OrderRepository;

/// Deterministic pricing policy: tax is a flat 5% of the subtotal
const TAX_RATE_PERCENT: i64 = 5;

/// Flat shipping fee per currency
fn shipping_fee(currency: Currency) -> Decimal {
    match currency {
        Currency::Pkr => Decimal::from(150),
        Currency::Usd => Decimal::from(10),
    }
}

/// Builds orders from remote cart and product state
pub struct OrderAggregator {
    cart: Arc<dyn CartClient>,
    products: Arc<dyn ProductClient>,
    orders: Arc<dyn OrderRepository>,
}

impl OrderAggregator {
    pub fn new(
        cart: Arc<dyn CartClient>,
        products: Arc<dyn ProductClient>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            cart,
            products,
            orders,
        }
    }

    /// Create an order for the authenticated user from their current cart
    pub async fn create_order(
        &self,
        claims: &Claims,
        bearer: &str,
        shipping_address: Address,
    ) -> Result<Order, AppError> {
        let cart = self
            .cart
            .current_cart(bearer)
            .await
            .map_err(|e| e.into_app_error("cart"))?;
        if cart.items.is_empty() {
            return Err(AppError::empty_cart());
        }

        let mut lines = Vec::with_capacity(cart.items.len());
        let mut currency: Option<Currency> = None;
        let mut subtotal = Decimal::ZERO;

        for item in &cart.items {
            if item.quantity == 0 {
                return Err(AppError::validation(format!(
                    "quantity for product {} must be positive",
                    item.product_id
                )));
            }

            let product = match self.products.product(&item.product_id).await {
                Ok(product) => product,
                Err(err) => {
                    tracing::warn!(
                        product_id = %item.product_id,
                        error = %err,
                        "product fetch failed during aggregation"
                    );
                    return Err(match err {
                        crate::clients::ClientError::Timeout => {
                            AppError::collaborator_timeout("product")
                        }
                        _ => AppError::product_unavailable(&item.product_id),
                    });
                }
            };

            // Whole-order atomicity: any short line rejects the order
            if item.quantity > product.stock {
                return Err(AppError::insufficient_stock(&item.product_id));
            }

            match currency {
                None => currency = Some(product.price.currency),
                Some(c) if c != product.price.currency => {
                    return Err(AppError::currency_mismatch());
                }
                Some(_) => {}
            }

            let line_total = product.price.amount * Decimal::from(item.quantity);
            subtotal += line_total;
            lines.push(OrderLine {
                product_id: product.id,
                title: product.title,
                quantity: item.quantity,
                unit_price: product.price,
                line_total: Money::new(line_total, product.price.currency),
            });
        }

        // Non-empty cart, so a currency was set above
        let currency = currency.ok_or_else(|| AppError::internal("no currency resolved"))?;
        let tax = (subtotal * Decimal::from(TAX_RATE_PERCENT) / Decimal::from(100)).round_dp(2);
        let shipping = shipping_fee(currency);
        let total = subtotal + tax + shipping;

        if let Some(field) = shipping_address.missing_field() {
            return Err(AppError::invalid_address(field));
        }

        let order = Order {
            id: Order::new_id(),
            user_id: claims.sub.clone(),
            lines,
            subtotal: Money::new(subtotal, currency),
            tax: Money::new(tax, currency),
            shipping: Money::new(shipping, currency),
            total_price: Money::new(total, currency),
            shipping_address,
            status: OrderStatus::Pending,
            created_at: Utc::now().timestamp_millis(),
        };

        self.orders.insert(&order).await?;
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = %order.total_price,
            "order created"
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use shared::ErrorCode;

    use crate::clients::{Cart, CartItem, ClientError, ProductInfo};
    use crate::repository::MemoryOrderRepository;

    struct FakeCart {
        items: Vec<CartItem>,
    }

    #[async_trait]
    impl CartClient for FakeCart {
        async fn current_cart(&self, _bearer: &str) -> Result<Cart, ClientError> {
            Ok(Cart {
                items: self.items.clone(),
            })
        }
    }

    struct TimeoutCart;

    #[async_trait]
    impl CartClient for TimeoutCart {
        async fn current_cart(&self, _bearer: &str) -> Result<Cart, ClientError> {
            Err(ClientError::Timeout)
        }
    }

    struct FakeProducts {
        products: HashMap<String, ProductInfo>,
    }

    #[async_trait]
    impl ProductClient for FakeProducts {
        async fn product(&self, product_id: &str) -> Result<ProductInfo, ClientError> {
            self.products
                .get(product_id)
                .cloned()
                .ok_or(ClientError::Status(404))
        }
    }

    fn product(id: &str, amount: i64, currency: Currency, stock: u32) -> ProductInfo {
        ProductInfo {
            id: id.to_string(),
            title: format!("Product {id}"),
            price: Money::new(Decimal::from(amount), currency),
            stock,
        }
    }

    fn claims() -> Claims {
        Claims {
            sub: "u1".into(),
            email: "u1@example.com".into(),
            username: "alice".into(),
            role: "user".into(),
            exp: 4_102_444_800,
        }
    }

    fn address() -> Address {
        Address {
            street: "123 Main St".into(),
            city: "Metropolis".into(),
            state: "CA".into(),
            zip: "90210".into(),
            country: "USA".into(),
        }
    }

    fn aggregator(
        items: Vec<CartItem>,
        products: Vec<ProductInfo>,
    ) -> (OrderAggregator, Arc<MemoryOrderRepository>) {
        let repo = Arc::new(MemoryOrderRepository::new());
        let agg = OrderAggregator::new(
            Arc::new(FakeCart { items }),
            Arc::new(FakeProducts {
                products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            }),
            repo.clone(),
        );
        (agg, repo)
    }

    fn item(product_id: &str, quantity: u32) -> CartItem {
        CartItem {
            product_id: product_id.into(),
            quantity,
        }
    }

    #[tokio::test]
    async fn totals_derive_from_authoritative_prices() {
        // 2 x 100 PKR + 1 x 200 PKR = 400; tax 5% = 20; shipping 150
        let (agg, repo) = aggregator(
            vec![item("a", 2), item("b", 1)],
            vec![
                product("a", 100, Currency::Pkr, 10),
                product("b", 200, Currency::Pkr, 5),
            ],
        );

        let order = agg.create_order(&claims(), "token", address()).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.subtotal.amount, Decimal::from(400));
        assert_eq!(order.tax.amount, Decimal::from(20));
        assert_eq!(order.shipping.amount, Decimal::from(150));
        assert_eq!(order.total_price.amount, Decimal::from(570));
        assert_eq!(order.total_price.currency, Currency::Pkr);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn empty_cart_persists_nothing() {
        let (agg, repo) = aggregator(vec![], vec![]);
        let err = agg
            .create_order(&claims(), "token", address())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyCart);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn out_of_stock_rejects_whole_order() {
        let (agg, repo) = aggregator(
            vec![item("a", 1), item("b", 1)],
            vec![
                product("a", 100, Currency::Pkr, 10),
                product("b", 200, Currency::Pkr, 0),
            ],
        );
        let err = agg
            .create_order(&claims(), "token", address())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_unavailable() {
        let (agg, repo) = aggregator(vec![item("ghost", 1)], vec![]);
        let err = agg
            .create_order(&claims(), "token", address())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProductUnavailable);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn mixed_currencies_are_rejected() {
        let (agg, repo) = aggregator(
            vec![item("a", 1), item("b", 1)],
            vec![
                product("a", 100, Currency::Pkr, 10),
                product("b", 20, Currency::Usd, 10),
            ],
        );
        let err = agg
            .create_order(&claims(), "token", address())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CurrencyMismatch);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn incomplete_address_is_rejected() {
        let (agg, repo) = aggregator(
            vec![item("a", 1)],
            vec![product("a", 100, Currency::Pkr, 10)],
        );
        let mut addr = address();
        addr.zip = String::new();
        let err = agg.create_order(&claims(), "token", addr).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidShippingAddress);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn cart_timeout_surfaces_as_collaborator_timeout() {
        let repo = Arc::new(MemoryOrderRepository::new());
        let agg = OrderAggregator::new(
            Arc::new(TimeoutCart),
            Arc::new(FakeProducts {
                products: HashMap::new(),
            }),
            repo.clone(),
        );
        let err = agg
            .create_order(&claims(), "token", address())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CollaboratorTimeout);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn fractional_tax_rounds_to_cents() {
        // 3 x 33 USD = 99; 5% = 4.95; shipping 10; total 113.95
        let (agg, _repo) = aggregator(
            vec![item("a", 3)],
            vec![product("a", 33, Currency::Usd, 10)],
        );
        let order = agg.create_order(&claims(), "token", address()).await.unwrap();
        assert_eq!(order.tax.amount, Decimal::new(495, 2));
        assert_eq!(order.total_price.amount, Decimal::new(11395, 2));
    }
}
