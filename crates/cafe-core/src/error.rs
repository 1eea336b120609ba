//! # Error Types
//!
//! Domain-specific error types for cafe-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cafe-core errors (this file)                                          │
//! │  ├── CoreError        - Cart rule violations                           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cafe-db errors (separate crate)                                       │
//! │  ├── DbError          - Database operation failures                    │
//! │  ├── LedgerError      - Stock / loyalty ledger refusals                │
//! │  └── CheckoutError    - What the cashier UI sees from checkout         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ┐                                   │
//! │        DbError → LedgerError ──────┴──► CheckoutError → UI              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised while editing a cart.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds the per-line maximum.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Requested quantity is more than the stock known when the product was
    /// added.
    ///
    /// ## User Workflow
    /// ```text
    /// Add "Latte" x5 to cart
    ///      │
    ///      ▼
    /// Product shows stock = 3
    ///      │
    ///      ▼
    /// ExceedsAvailableStock { product_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 left"
    /// ```
    #[error("Only {available} of product {product_id} available, requested {requested}")]
    ExceedsAvailableStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    /// Product is not in the cart.
    #[error("Product {0} not in cart")]
    LineNotFound(i64),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. a phone number with letters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::ExceedsAvailableStock {
            product_id: 7,
            available: 3,
            requested: 5,
        };
        assert_eq!(err.to_string(), "Only 3 of product 7 available, requested 5");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "phone".to_string(),
        };
        assert_eq!(validation_err.to_string(), "phone is required");
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
