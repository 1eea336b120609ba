//! # Order Repository
//!
//! The order store: committed orders and their lines.
//!
//! Orders are written only by the checkout coordinator, inside its
//! transaction, through the `*_in` functions. Everything else here reads.
//!
//! ## Order Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order Structure                                 │
//! │                                                                         │
//! │  Order #1042                                                            │
//! │  ├── customer_id: 17 (NULL for walk-ins)                               │
//! │  ├── subtotal: 100 000   discount: 30 000   total: 70 000               │
//! │  ├── points redeemed: 3.00   points accrued: 0.00                       │
//! │  │                                                                      │
//! │  └── Lines                                                              │
//! │      ├── Espresso    × 2 @ 35 000 = 70 000                              │
//! │      └── Croissant   × 1 @ 30 000 = 30 000                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use cafe_core::{CheckoutLine, Money, Order, OrderLine, PaymentMethod, Points};

use crate::error::DbResult;

/// Values of an order about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: Option<i64>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub points_redeemed: Points,
    pub points_accrued: Points,
    pub payment_method: PaymentMethod,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Repository for the order store.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Writes (inside the checkout transaction)
    // =========================================================================

    /// Inserts the order row and returns it with its assigned id.
    pub async fn insert_order_in(conn: &mut SqliteConnection, order: &NewOrder) -> DbResult<Order> {
        let inserted = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                customer_id, subtotal_cents, discount_cents, total_cents,
                points_redeemed_hundredths, points_accrued_hundredths,
                payment_method, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING
                id, customer_id, subtotal_cents, discount_cents, total_cents,
                points_redeemed_hundredths, points_accrued_hundredths,
                payment_method, created_by, created_at
            "#,
        )
        .bind(order.customer_id)
        .bind(order.subtotal.cents())
        .bind(order.discount.cents())
        .bind(order.total.cents())
        .bind(order.points_redeemed.hundredths())
        .bind(order.points_accrued.hundredths())
        .bind(order.payment_method)
        .bind(order.created_by)
        .bind(order.created_at)
        .fetch_one(&mut *conn)
        .await?;

        debug!(order_id = inserted.id, total = %order.total, "Order row inserted");
        Ok(inserted)
    }

    /// Inserts one order line with the unit price captured in the cart.
    pub async fn insert_line_in(
        conn: &mut SqliteConnection,
        order_id: i64,
        line: &CheckoutLine,
    ) -> DbResult<OrderLine> {
        let inserted = sqlx::query_as::<_, OrderLine>(
            r#"
            INSERT INTO order_lines (order_id, product_id, quantity, unit_price_cents, line_total_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, order_id, product_id, quantity, unit_price_cents, line_total_cents
            "#,
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total().cents())
        .fetch_one(&mut *conn)
        .await?;

        Ok(inserted)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order by id.
    pub async fn get_order(&self, id: i64) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, customer_id, subtotal_cents, discount_cents, total_cents,
                points_redeemed_hundredths, points_accrued_hundredths,
                payment_method, created_by, created_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets the lines of an order in insertion order.
    pub async fn get_lines(&self, order_id: i64) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents, line_total_cents
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// A customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: i64, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, customer_id, subtotal_cents, discount_cents, total_cents,
                points_redeemed_hundredths, points_accrued_hundredths,
                payment_method, created_by, created_at
            FROM orders
            WHERE customer_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Counts committed orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts order lines across all orders.
    pub async fn count_lines(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_lines")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
