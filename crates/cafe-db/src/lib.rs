//! # cafe-db: Database Layer for the Cafe POS
//!
//! SQLite storage, the Stock and Loyalty Ledgers, and the checkout
//! transaction that ties them together.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cafe POS Data Flow                               │
//! │                                                                         │
//! │  Cashier presses Pay (Cart → CheckoutRequest)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cafe-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │              ┌──────────────────────────┐                       │   │
//! │  │              │     CheckoutService      │                       │   │
//! │  │              │  (one SQLite transaction)│                       │   │
//! │  │              └──┬──────────┬─────────┬──┘                       │   │
//! │  │                 │          │         │                          │   │
//! │  │   ┌─────────────▼┐ ┌───────▼──────┐ ┌▼──────────────┐          │   │
//! │  │   │ LoyaltyLedger│ │ OrderRepo    │ │ StockLedger   │          │   │
//! │  │   │ customers    │ │ orders,lines │ │ stock,history │          │   │
//! │  │   └──────────────┘ └──────────────┘ └───────────────┘          │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs) · migrations · PosConfig (config.rs)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ~/.local/share/cafe-pos/cafe.db                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage, ledger and checkout errors
//! - [`ledger`] - Stock Ledger and Loyalty Ledger
//! - [`repository`] - Products and the order store
//! - [`checkout`] - The checkout coordinator
//! - [`config`] - Register configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cafe_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./cafe.db")).await?;
//!
//! let request = CheckoutRequest::new(cart.checkout_lines(), PaymentMethod::Cash, actor_id)
//!     .with_customer(CustomerInput::new("Lan", "0900000000"));
//! let receipt = db.checkout().checkout(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::CheckoutService;
pub use config::{ConfigError, PosConfig};
pub use error::{CheckoutError, CheckoutResult, DbError, DbResult, LedgerError, LedgerResult};
pub use ledger::loyalty::{Accrual, LoyaltyLedger, Redemption};
pub use ledger::stock::{MovementSource, StockLedger};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::order::{NewOrder, OrderRepository};
pub use repository::product::{NewProduct, ProductRepository};
