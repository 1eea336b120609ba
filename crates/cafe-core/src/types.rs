//! # Domain Types
//!
//! Core domain records exchanged between the ledgers, the checkout
//! coordinator and the cashier UI.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │   Customer      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  name           │   │  customer_id?   │   │  phone (key)    │       │
//! │  │  price_cents    │   │  total_cents    │   │  points (1/100) │       │
//! │  │  stock          │   │  payment_method │   └─────────────────┘       │
//! │  └─────────────────┘   └────────┬────────┘                              │
//! │                                 │ 1..*                                  │
//! │  ┌─────────────────┐   ┌────────▼────────┐                              │
//! │  │ StockMovement   │   │   OrderLine     │  unit price frozen at sale   │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records keep raw integer columns (`*_cents`, `*_hundredths`) so they map
//! one-to-one onto SQLite rows; accessors return [`Money`] / [`Points`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::loyalty::RedemptionRequest;
use crate::money::Money;
use crate::points::Points;

// =============================================================================
// Product
// =============================================================================

/// A product on the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,

    /// Display name shown to the cashier.
    pub name: String,

    /// Current list price in cents. Carts freeze this at add time.
    pub price_cents: i64,

    /// On-hand quantity. Only the Stock Ledger changes it.
    pub stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` can be taken from current stock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        quantity > 0 && self.stock >= quantity
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A loyalty customer, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: String,

    /// Point balance in hundredths. Never negative.
    pub points_hundredths: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn points(&self) -> Points {
        Points::from_hundredths(self.points_hundredths)
    }
}

/// Customer details typed at the register.
///
/// A blank phone means an anonymous sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
}

impl CustomerInput {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        CustomerInput {
            name: name.into(),
            phone: phone.into(),
        }
    }

    /// Walk-in customer with no loyalty record.
    pub fn anonymous() -> Self {
        CustomerInput::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.phone.trim().is_empty()
    }

    /// Phone with surrounding whitespace removed; the lookup key.
    pub fn phone_key(&self) -> &str {
        self.phone.trim()
    }

    /// Name to store for a new customer: the trimmed name, or the phone when
    /// no name was typed.
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            self.phone_key()
        } else {
            name
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the order was paid. One tender per order.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    EWallet,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::BankTransfer,
        PaymentMethod::Card,
        PaymentMethod::EWallet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::EWallet => "e_wallet",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" | "bank-transfer" | "transfer" => Ok(PaymentMethod::BankTransfer),
            "card" => Ok(PaymentMethod::Card),
            "e_wallet" | "e-wallet" | "ewallet" => Ok(PaymentMethod::EWallet),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Checkout Line
// =============================================================================

/// One line handed to checkout: the boundary shape of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutLine {
    pub product_id: i64,
    /// Unit price captured when the line was added to the cart.
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl CheckoutLine {
    pub fn new(product_id: i64, unit_price: Money, quantity: i64) -> Self {
        CheckoutLine {
            product_id,
            unit_price_cents: unit_price.cents(),
            quantity,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// `None` when unit price × quantity does not fit in [`Money`].
    #[inline]
    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price().checked_multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A committed order. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: i64,
    /// `None` for anonymous sales.
    pub customer_id: Option<i64>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// Amount paid: subtotal minus discount, never negative.
    pub total_cents: i64,
    pub points_redeemed_hundredths: i64,
    pub points_accrued_hundredths: i64,
    pub payment_method: PaymentMethod,
    /// Actor (employee) who rang up the sale.
    pub created_by: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn points_redeemed(&self) -> Points {
        Points::from_hundredths(self.points_redeemed_hundredths)
    }

    #[inline]
    pub fn points_accrued(&self) -> Points {
        Points::from_hundredths(self.points_accrued_hundredths)
    }
}

/// A line of a committed order.
/// Uses snapshot pattern: the unit price is the one charged, not the
/// product's current price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl OrderLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a product's stock changed.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MovementReason {
    /// Sold through checkout.
    Sale,
    /// Goods received from a supplier.
    Receiving,
}

/// One entry of a product's stock history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: i64,
    pub product_id: i64,
    /// Signed change: negative for sales.
    pub change: i64,
    pub stock_after: i64,
    pub reason: MovementReason,
    pub order_id: Option<i64>,
    pub actor_id: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Checkout Request
// =============================================================================

/// Everything checkout needs, decided by the cashier before paying.
///
/// ## Example
/// ```rust
/// use cafe_core::{CheckoutLine, CheckoutRequest, CustomerInput, Money, PaymentMethod};
/// use cafe_core::RedemptionRequest;
///
/// let request = CheckoutRequest::new(
///     vec![CheckoutLine::new(1, Money::from_major(50_000), 2)],
///     PaymentMethod::Cash,
///     7,
/// )
/// .with_customer(CustomerInput::new("Lan", "0900000000"))
/// .with_redemption(RedemptionRequest::EntireBalance);
///
/// assert_eq!(request.subtotal(), Money::from_major(100_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    /// Blank phone for an anonymous sale.
    pub customer: CustomerInput,
    pub payment_method: PaymentMethod,
    /// Ignored for anonymous sales.
    pub redemption: Option<RedemptionRequest>,
    /// Employee ringing up the sale.
    pub actor_id: i64,
}

impl CheckoutRequest {
    pub fn new(lines: Vec<CheckoutLine>, payment_method: PaymentMethod, actor_id: i64) -> Self {
        CheckoutRequest {
            lines,
            customer: CustomerInput::anonymous(),
            payment_method,
            redemption: None,
            actor_id,
        }
    }

    pub fn with_customer(mut self, customer: CustomerInput) -> Self {
        self.customer = customer;
        self
    }

    pub fn with_redemption(mut self, redemption: RedemptionRequest) -> Self {
        self.redemption = Some(redemption);
        self
    }

    /// Σ unit price × quantity, before any discount.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CheckoutLine::line_total).sum()
    }

    /// [`subtotal`](Self::subtotal), or `None` if any line or the sum
    /// overflows.
    pub fn checked_subtotal(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.checked_line_total()?))
    }
}

// =============================================================================
// Checkout Receipt
// =============================================================================

/// What a successful checkout hands back for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub discount_applied: Money,
    pub points_consumed: Points,
    pub points_accrued: Points,
    /// Balance after this sale; `None` for anonymous sales.
    pub new_loyalty_balance: Option<Points>,
}

impl CheckoutReceipt {
    #[inline]
    pub fn order_id(&self) -> i64 {
        self.order.id
    }

    #[inline]
    pub fn final_total(&self) -> Money {
        self.order.total()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_round_trip_names() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        assert_eq!("E-Wallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::EWallet);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
    }

    #[test]
    fn test_customer_input_anonymous() {
        assert!(CustomerInput::anonymous().is_anonymous());
        assert!(CustomerInput::new("Lan", "   ").is_anonymous());
        assert!(!CustomerInput::new("", "0900000000").is_anonymous());
    }

    #[test]
    fn test_customer_input_display_name_falls_back_to_phone() {
        let input = CustomerInput::new("  ", " 0900000000 ");
        assert_eq!(input.phone_key(), "0900000000");
        assert_eq!(input.display_name(), "0900000000");
        assert_eq!(CustomerInput::new(" Lan ", "0900").display_name(), "Lan");
    }

    #[test]
    fn test_checkout_line_total() {
        let line = CheckoutLine::new(1, Money::from_major(50_000), 2);
        assert_eq!(line.line_total(), Money::from_major(100_000));
    }

    #[test]
    fn test_checked_subtotal_reports_overflow() {
        let request = CheckoutRequest::new(
            vec![CheckoutLine::new(1, Money::from_major(50_000), 2)],
            PaymentMethod::Cash,
            1,
        );
        assert_eq!(request.checked_subtotal(), Some(Money::from_major(100_000)));

        let huge = CheckoutRequest::new(
            vec![CheckoutLine::new(1, Money::from_major(50_000), 10_000_000_000_000)],
            PaymentMethod::Cash,
            1,
        );
        assert_eq!(huge.checked_subtotal(), None);

        let big = Money::from_cents(i64::MAX / 2 + 1);
        let summed = CheckoutRequest::new(
            vec![CheckoutLine::new(1, big, 1), CheckoutLine::new(2, big, 1)],
            PaymentMethod::Cash,
            1,
        );
        assert_eq!(summed.checked_subtotal(), None);
    }

    #[test]
    fn test_product_can_sell() {
        let now = Utc::now();
        let product = Product {
            id: 1,
            name: "Espresso".to_string(),
            price_cents: 3_500_000,
            stock: 1,
            created_at: now,
            updated_at: now,
        };
        assert!(product.can_sell(1));
        assert!(!product.can_sell(2));
        assert!(!product.can_sell(0));
    }
}
