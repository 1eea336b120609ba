//! # Product Repository
//!
//! Catalog reads and product creation.
//!
//! Stock is not written here: a new product starts at zero and receives its
//! opening stock through [`StockLedger::increment`](crate::StockLedger::increment),
//! so every unit on hand has a movement behind it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use cafe_core::validation::{validate_price_cents, validate_product_name};
use cafe_core::{Money, Product, ValidationError};

use crate::error::DbResult;

/// Fields needed to create a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        NewProduct {
            name: name.into(),
            price,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_product_name(&self.name)?;
        validate_price_cents(self.price.cents())
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product with zero stock.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with its assigned id
    /// * `Err(DbError::Validation)` - blank name or negative price
    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        debug!(name = %product.name, price = %product.price, "Inserting product");
        product.validate()?;

        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, price_cents, stock, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            RETURNING id, name, price_cents, stock, created_at, updated_at
            "#,
        )
        .bind(product.name.trim())
        .bind(product.price.cents())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price_cents, stock, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists products by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price_cents, stock, created_at, updated_at
            FROM products
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Case-insensitive substring search on the product name.
    ///
    /// An empty query lists everything.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list(limit).await;
        }

        debug!(query = %query, limit = %limit, "Searching products");

        let pattern = format!("%{}%", query);
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price_cents, stock, created_at, updated_at
            FROM products
            WHERE name LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts products (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let latte = repo
            .insert(&NewProduct::new("  Latte ", Money::from_major(45_000)))
            .await
            .unwrap();
        assert_eq!(latte.name, "Latte");
        assert_eq!(latte.stock, 0);

        let fetched = repo.get_by_id(latte.id).await.unwrap().unwrap();
        assert_eq!(fetched, latte);
        assert!(repo.get_by_id(latte.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_and_count() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        for name in ["Iced Latte", "Hot Latte", "Espresso"] {
            repo.insert(&NewProduct::new(name, Money::from_major(30_000)))
                .await
                .unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.search("latte", 10).await.unwrap().len(), 2);
        assert_eq!(repo.search("", 10).await.unwrap().len(), 3);
        assert_eq!(repo.list(2).await.unwrap()[0].name, "Espresso");
    }

    #[test]
    fn test_new_product_validation() {
        assert!(NewProduct::new("Mocha", Money::from_major(40_000)).validate().is_ok());
        assert!(NewProduct::new(" ", Money::from_major(40_000)).validate().is_err());
        assert!(NewProduct::new("Mocha", Money::from_cents(-1)).validate().is_err());
    }
}
