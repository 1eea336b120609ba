//! # Database Error Types
//!
//! Error types for storage, the ledgers and checkout.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError ← Stock / loyalty refusals (not found, insufficient)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CheckoutError ← The only error the cashier UI sees from checkout       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use cafe_core::{Points, ValidationError};
use thiserror::Error;

// =============================================================================
// Db Error
// =============================================================================

/// Database operation errors.
///
/// These wrap sqlx errors and add the categorization callers branch on.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (e.g. a second customer with one phone).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Order line referencing a product id that doesn't exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, negative points, ...).
    #[error("Constraint violation: {0}")]
    CheckViolation(String),

    /// Input rejected before reaching SQLite.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Another connection held the write lock past the busy timeout.
    #[error("Database is busy")]
    Busy,

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite reports constraints by message:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation(msg.to_string())
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Busy
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Refusals from the Stock Ledger and the Loyalty Ledger.
///
/// A refused operation never mutates anything.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: i64, quantity: i64 },

    #[error("Customer {0} not found")]
    CustomerNotFound(i64),

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: Points, available: Points },

    /// A loyalty account needs a phone number.
    #[error("Customer phone is required")]
    MissingPhone,

    #[error("Invalid customer: {0}")]
    InvalidCustomer(#[from] ValidationError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(err.into())
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Checkout Error
// =============================================================================

/// Why a checkout did not commit.
///
/// Every variant means the whole checkout was rolled back: no order, no
/// stock change, no loyalty change, no new customer.
///
/// ## User Workflow
/// ```text
/// Cashier presses Pay
///      │
///      ▼
/// CheckoutService::checkout()
///      │
///      ├── EmptyCart / InvalidQuantity / InvalidUnitPrice / InvalidCustomer
///      │       → fix the cart or the customer form
///      ├── InsufficientStock / ProductNotFound
///      │       → edit the cart, pay again
///      ├── InsufficientPoints
///      │       → lower the redemption, pay again
///      └── PersistenceFailure / TimedOut   (is_retryable)
///              → same request can simply be submitted again
/// ```
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: i64, quantity: i64 },

    #[error("Invalid unit price for product {product_id}")]
    InvalidUnitPrice { product_id: i64 },

    /// Customer form failed validation (bad phone format, name too long).
    #[error("Invalid customer: {0}")]
    InvalidCustomer(ValidationError),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: Points, available: Points },

    #[error("Checkout timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] DbError),
}

impl CheckoutError {
    /// Whether submitting the same request again may succeed.
    ///
    /// Business refusals are final until the cart or customer changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::PersistenceFailure(_) | CheckoutError::TimedOut(_)
        )
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
            LedgerError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            LedgerError::InvalidQuantity {
                product_id,
                quantity,
            } => CheckoutError::InvalidQuantity {
                product_id,
                quantity,
            },
            LedgerError::InsufficientPoints {
                requested,
                available,
            } => CheckoutError::InsufficientPoints {
                requested,
                available,
            },
            LedgerError::MissingPhone => CheckoutError::InvalidCustomer(ValidationError::Required {
                field: "phone".to_string(),
            }),
            LedgerError::InvalidCustomer(e) => CheckoutError::InvalidCustomer(e),
            // The customer row was read inside the same transaction.
            LedgerError::CustomerNotFound(id) => {
                CheckoutError::PersistenceFailure(DbError::not_found("Customer", id))
            }
            LedgerError::Db(e) => CheckoutError::PersistenceFailure(e),
        }
    }
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        CheckoutError::PersistenceFailure(err.into())
    }
}

/// Result type for checkout.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_persistence_and_timeout_are_retryable() {
        assert!(CheckoutError::PersistenceFailure(DbError::Busy).is_retryable());
        assert!(CheckoutError::TimedOut(Duration::from_millis(10)).is_retryable());

        assert!(!CheckoutError::EmptyCart.is_retryable());
        assert!(!CheckoutError::ProductNotFound(1).is_retryable());
        assert!(!CheckoutError::InsufficientStock {
            product_id: 1,
            requested: 2,
            available: 1
        }
        .is_retryable());
        assert!(!CheckoutError::InsufficientPoints {
            requested: Points::whole(5),
            available: Points::whole(3)
        }
        .is_retryable());
    }

    #[test]
    fn test_ledger_errors_map_to_checkout_errors() {
        let err: CheckoutError = LedgerError::InsufficientStock {
            product_id: 4,
            requested: 2,
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { product_id: 4, requested: 2, available: 1 }
        ));

        let err: CheckoutError = LedgerError::Db(DbError::Busy).into();
        assert!(err.is_retryable());

        let err: CheckoutError = LedgerError::MissingPhone.into();
        assert!(matches!(err, CheckoutError::InvalidCustomer(_)));
    }

    #[test]
    fn test_insufficient_points_message() {
        let err = LedgerError::InsufficientPoints {
            requested: Points::whole(5),
            available: Points::from_hundredths(250),
        };
        assert_eq!(err.to_string(), "Insufficient points: requested 5.00, available 2.50");
    }
}
