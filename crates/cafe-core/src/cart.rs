//! # Cart
//!
//! The cashier's working order before checkout. Held by the caller, never
//! persisted.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action           Method                  Cart Change           │
//! │  ──────────────           ──────                  ───────────           │
//! │                                                                         │
//! │  Tap product ────────────► add_item() ──────────► push or merge line    │
//! │                                                                         │
//! │  Change quantity ────────► update_quantity() ───► lines[i].qty = n      │
//! │                                                                         │
//! │  Remove line ────────────► remove_item() ───────► lines.remove(i)       │
//! │                                                                         │
//! │  Pay ────────────────────► checkout_lines() ────► (read only)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stock check here is advisory: it uses the stock the product showed
//! when it was added. The Stock Ledger re-checks at commit.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CheckoutLine, Product};
use crate::validation::{validate_cart_size, validate_quantity};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
///
/// Name and unit price are frozen when the product is added, so a price
/// change in the catalog does not touch an open cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Stock the product showed when it was added.
    pub available_at_add: i64,
}

impl CartLine {
    fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            available_at_add: product.stock,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    fn check_quantity(&self, quantity: i64) -> CoreResult<()> {
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        if quantity > self.available_at_add {
            return Err(CoreError::ExceedsAvailableStock {
                product_id: self.product_id,
                available: self.available_at_add,
                requested: quantity,
            });
        }
        Ok(())
    }
}

/// The cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges)
/// - Every quantity is > 0
/// - No quantity exceeds the stock known when its product was added
/// - At most [`MAX_CART_ITEMS`] lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds `quantity` of `product`, merging with an existing line.
    ///
    /// Refuses quantities that are not positive, that exceed the per-line
    /// maximum, or that exceed the product's current stock.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            // The fresher stock figure wins.
            line.available_at_add = product.stock;
            let new_qty = line.quantity + quantity;
            line.check_quantity(new_qty)?;
            line.quantity = new_qty;
            return Ok(());
        }

        if validate_cart_size(self.lines.len()).is_err() {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        let line = CartLine::from_product(product, quantity);
        line.check_quantity(quantity)?;
        self.lines.push(line);
        Ok(())
    }

    /// Sets the quantity of a line. Zero removes it.
    pub fn update_quantity(&mut self, product_id: i64, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(CoreError::LineNotFound(product_id))?;
        line.check_quantity(quantity)?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: i64) -> CoreResult<()> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == initial_len {
            Err(CoreError::LineNotFound(product_id))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line totals, before any loyalty discount.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Lines in the shape checkout expects.
    pub fn checkout_lines(&self) -> Vec<CheckoutLine> {
        self.lines
            .iter()
            .map(|l| CheckoutLine {
                product_id: l.product_id,
                unit_price_cents: l.unit_price_cents,
                quantity: l.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_product(id: i64, price_major: i64, stock: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            price_cents: Money::from_major(price_major).cents(),
            stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_add_item() {
        let mut cart = Cart::new();
        let product = test_product(1, 50_000, 10);

        cart.add_item(&product, 2).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
        assert_eq!(cart.subtotal(), Money::from_major(100_000));
    }

    #[test]
    fn test_cart_add_same_product_merges() {
        let mut cart = Cart::new();
        let product = test_product(1, 50_000, 10);

        cart.add_item(&product, 2).unwrap();
        cart.add_item(&product, 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_cart_refuses_more_than_stock() {
        let mut cart = Cart::new();
        let product = test_product(1, 50_000, 3);

        let err = cart.add_item(&product, 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ExceedsAvailableStock { available: 3, requested: 5, .. }
        ));
        assert!(cart.is_empty());

        cart.add_item(&product, 2).unwrap();
        assert!(cart.add_item(&product, 2).is_err());
        assert_eq!(cart.total_quantity(), 2);
    }

    #[test]
    fn test_cart_refuses_non_positive_quantity() {
        let mut cart = Cart::new();
        let product = test_product(1, 50_000, 3);

        assert!(matches!(cart.add_item(&product, 0), Err(CoreError::Validation(_))));
        assert!(matches!(cart.add_item(&product, -2), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_cart_price_frozen_at_add() {
        let mut cart = Cart::new();
        let mut product = test_product(1, 50_000, 10);
        cart.add_item(&product, 1).unwrap();

        product.price_cents = Money::from_major(60_000).cents();
        cart.add_item(&product, 1).unwrap();

        assert_eq!(cart.lines()[0].unit_price(), Money::from_major(50_000));
        assert_eq!(cart.subtotal(), Money::from_major(100_000));
    }

    #[test]
    fn test_update_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 50_000, 10), 1).unwrap();
        cart.add_item(&test_product(2, 30_000, 10), 1).unwrap();

        cart.update_quantity(1, 4).unwrap();
        assert_eq!(cart.total_quantity(), 5);

        assert!(cart.update_quantity(1, 11).is_err());
        assert!(matches!(cart.update_quantity(9, 1), Err(CoreError::LineNotFound(9))));

        cart.update_quantity(2, 0).unwrap();
        assert_eq!(cart.item_count(), 1);

        cart.remove_item(1).unwrap();
        assert!(cart.is_empty());
        assert!(cart.remove_item(1).is_err());
    }

    #[test]
    fn test_cart_line_limit() {
        let mut cart = Cart::new();
        for id in 0..MAX_CART_ITEMS as i64 {
            cart.add_item(&test_product(id, 1_000, 5), 1).unwrap();
        }
        let err = cart.add_item(&test_product(-1, 1_000, 5), 1).unwrap_err();
        assert!(matches!(err, CoreError::CartTooLarge { .. }));
    }

    #[test]
    fn test_checkout_lines_keep_order_and_prices() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(7, 50_000, 10), 2).unwrap();
        cart.add_item(&test_product(3, 30_000, 10), 1).unwrap();

        let lines = cart.checkout_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, 7);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[1].unit_price(), Money::from_major(30_000));

        cart.clear();
        assert!(cart.checkout_lines().is_empty());
    }
}
