//! # Repository Module
//!
//! Plain table access that is not a ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories vs Ledgers                              │
//! │                                                                         │
//! │  Repositories (this module)         Ledgers (crate::ledger)             │
//! │  ─────────────────────────          ───────────────────────             │
//! │  ProductRepository                  StockLedger                         │
//! │  ├── insert (stock = 0)             ├── decrement / increment           │
//! │  ├── get_by_id, list, search        └── on_hand, history                │
//! │  └── count                                                              │
//! │                                     LoyaltyLedger                       │
//! │  OrderRepository                    ├── lookup_or_create                │
//! │  ├── insert_order_in                └── accrue / redeem                 │
//! │  ├── insert_line_in                                                     │
//! │  └── get_order, get_lines, ...      Only ledgers change a quantity.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product creation and catalog reads
//! - [`OrderRepository`](order::OrderRepository) - The order store

pub mod order;
pub mod product;
