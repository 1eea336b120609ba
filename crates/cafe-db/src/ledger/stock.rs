//! # Stock Ledger
//!
//! Sole owner of on-hand quantity. Every change is one guarded statement plus
//! a row in `stock_movements`, written in the same transaction.
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products SET stock = stock - q                                  │
//! │  WHERE id = ? AND stock >= q                                            │
//! │  RETURNING stock                                                        │
//! │       │                                                                 │
//! │       ├── row returned ──► INSERT stock_movements ──► Ok(new stock)     │
//! │       │                                                                 │
//! │       └── no row ──► SELECT stock WHERE id = ?                          │
//! │                        ├── no product ──► ProductNotFound               │
//! │                        └── stock < q  ──► InsufficientStock             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, so no interleaving can take
//! stock below zero; the schema's `CHECK (stock >= 0)` backs it up.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use cafe_core::{MovementReason, StockMovement};

use crate::error::{DbResult, LedgerError, LedgerResult};

/// Who and what caused a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementSource {
    /// Order that sold the units, if any.
    pub order_id: Option<i64>,
    pub actor_id: i64,
}

impl MovementSource {
    pub fn sale(order_id: i64, actor_id: i64) -> Self {
        MovementSource {
            order_id: Some(order_id),
            actor_id,
        }
    }

    /// A change made outside any order (receiving, manual correction).
    pub fn actor(actor_id: i64) -> Self {
        MovementSource {
            order_id: None,
            actor_id,
        }
    }
}

/// Handle to the Stock Ledger.
///
/// Each mutation comes in two forms: `*_in` joins the caller's open
/// transaction, the plain form runs in a transaction of its own.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Takes `quantity` units of a product and returns the new stock.
    pub async fn decrement(
        &self,
        product_id: i64,
        quantity: i64,
        source: MovementSource,
    ) -> LedgerResult<i64> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let stock = Self::decrement_in(&mut tx, product_id, quantity, source).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// [`decrement`](Self::decrement) inside the caller's transaction.
    pub async fn decrement_in(
        conn: &mut SqliteConnection,
        product_id: i64,
        quantity: i64,
        source: MovementSource,
    ) -> LedgerResult<i64> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            RETURNING stock
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(stock_after) = updated else {
            return Err(match Self::on_hand_in(conn, product_id).await? {
                None => LedgerError::ProductNotFound(product_id),
                Some(available) => LedgerError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available,
                },
            });
        };

        record_movement(conn, product_id, -quantity, stock_after, MovementReason::Sale, source)
            .await?;

        debug!(product_id, quantity, stock_after, "Stock decremented");
        Ok(stock_after)
    }

    /// Adds received units and returns the new stock.
    pub async fn increment(
        &self,
        product_id: i64,
        quantity: i64,
        source: MovementSource,
    ) -> LedgerResult<i64> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let stock = Self::increment_in(&mut tx, product_id, quantity, source).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// [`increment`](Self::increment) inside the caller's transaction.
    pub async fn increment_in(
        conn: &mut SqliteConnection,
        product_id: i64,
        quantity: i64,
        source: MovementSource,
    ) -> LedgerResult<i64> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        let stock_after: i64 = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1
            RETURNING stock
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::ProductNotFound(product_id))?;

        record_movement(
            conn,
            product_id,
            quantity,
            stock_after,
            MovementReason::Receiving,
            source,
        )
        .await?;

        debug!(product_id, quantity, stock_after, "Stock received");
        Ok(stock_after)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current stock, or `None` if the product doesn't exist.
    pub async fn on_hand(&self, product_id: i64) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::on_hand_in(&mut conn, product_id).await
    }

    pub async fn on_hand_in(conn: &mut SqliteConnection, product_id: i64) -> DbResult<Option<i64>> {
        let stock = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(stock)
    }

    /// A product's movements, newest first.
    pub async fn history(&self, product_id: i64, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, change, stock_after, reason, order_id, actor_id, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Counts all movements (diagnostics and tests).
    pub async fn movement_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

async fn record_movement(
    conn: &mut SqliteConnection,
    product_id: i64,
    change: i64,
    stock_after: i64,
    reason: MovementReason,
    source: MovementSource,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (product_id, change, stock_after, reason, order_id, actor_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(product_id)
    .bind(change)
    .bind(stock_after)
    .bind(reason)
    .bind(source.order_id)
    .bind(source.actor_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::NewProduct;
    use crate::{Database, DbConfig};
    use cafe_core::Money;

    const ACTOR: i64 = 1;

    async fn setup(stock: i64) -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct::new("Espresso", Money::from_major(35_000)))
            .await
            .unwrap();
        if stock > 0 {
            db.stock()
                .increment(product.id, stock, MovementSource::actor(ACTOR))
                .await
                .unwrap();
        }
        (db, product.id)
    }

    #[tokio::test]
    async fn test_decrement_within_stock() {
        let (db, id) = setup(5).await;
        let ledger = db.stock();

        assert_eq!(ledger.decrement(id, 3, MovementSource::actor(ACTOR)).await.unwrap(), 2);
        assert_eq!(ledger.on_hand(id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_decrement_to_exactly_zero() {
        let (db, id) = setup(2).await;
        let ledger = db.stock();

        assert_eq!(ledger.decrement(id, 2, MovementSource::actor(ACTOR)).await.unwrap(), 0);
        assert_eq!(ledger.on_hand(id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_stock_unchanged() {
        let (db, id) = setup(1).await;
        let ledger = db.stock();

        let err = ledger.decrement(id, 2, MovementSource::actor(ACTOR)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock { requested: 2, available: 1, .. }
        ));
        assert_eq!(ledger.on_hand(id).await.unwrap(), Some(1));
        // Only the opening receipt.
        assert_eq!(ledger.movement_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (db, _) = setup(1).await;
        let ledger = db.stock();

        let err = ledger.decrement(999, 1, MovementSource::actor(ACTOR)).await.unwrap_err();
        assert!(matches!(err, LedgerError::ProductNotFound(999)));
        let err = ledger.increment(999, 1, MovementSource::actor(ACTOR)).await.unwrap_err();
        assert!(matches!(err, LedgerError::ProductNotFound(999)));
        assert_eq!(ledger.on_hand(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let (db, id) = setup(3).await;
        let ledger = db.stock();

        for qty in [0, -1] {
            let err = ledger.decrement(id, qty, MovementSource::actor(ACTOR)).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidQuantity { .. }));
            let err = ledger.increment(id, qty, MovementSource::actor(ACTOR)).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidQuantity { .. }));
        }
        assert_eq!(ledger.on_hand(id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let (db, id) = setup(10).await;
        let ledger = db.stock();
        ledger.decrement(id, 4, MovementSource::actor(ACTOR)).await.unwrap();

        let history = ledger.history(id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].change, -4);
        assert_eq!(history[0].stock_after, 6);
        assert_eq!(history[0].reason, MovementReason::Sale);
        assert_eq!(history[1].change, 10);
        assert_eq!(history[1].reason, MovementReason::Receiving);
        assert_eq!(history[1].order_id, None);
    }
}
