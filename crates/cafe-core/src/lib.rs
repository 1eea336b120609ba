//! # cafe-core: Pure Business Logic for the Cafe POS
//!
//! Money and point arithmetic, the cart, loyalty rules and domain records.
//! Nothing in this crate touches a database, a file or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cafe POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Cashier UI                                   │   │
//! │  │    Menu ──► Cart ──► Customer / Points ──► Pay ──► Receipt     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cafe-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │  loyalty  │  │   │
//! │  │   │  Product  │  │   Money   │  │   Cart    │  │  Policy   │  │   │
//! │  │   │   Order   │  │  Points   │  │ CartLine  │  │ Redeem    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cafe-db (Database Layer)                     │   │
//! │  │       Stock Ledger, Loyalty Ledger, CheckoutService             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Customer, Order, ...)
//! - [`money`] - Money with integer arithmetic
//! - [`points`] - Loyalty points, two decimal places
//! - [`loyalty`] - Accrual and redemption math
//! - [`cart`] - The cashier's cart
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use cafe_core::{LoyaltyPolicy, Money, Points};
//!
//! let policy = LoyaltyPolicy::default();
//!
//! // 3 points against a 40 000 subtotal: 30 000 off
//! let quote = policy.quote_redemption(Points::whole(3), Some(Money::from_major(40_000)));
//! assert_eq!(quote.discount, Money::from_major(30_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod points;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use loyalty::{
    LoyaltyPolicy, RedemptionQuote, RedemptionRequest, POINT_ACCRUAL_UNIT, POINT_REDEMPTION_VALUE,
};
pub use money::Money;
pub use points::Points;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// ## Business Reason
/// Catches typos at the register (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
