//! # Ledgers
//!
//! The only code allowed to change a quantity: product stock and customer
//! point balances.
//!
//! - [`StockLedger`](stock::StockLedger) - on-hand quantity and movement history
//! - [`LoyaltyLedger`](loyalty::LoyaltyLedger) - customers and point balances

pub mod loyalty;
pub mod stock;
