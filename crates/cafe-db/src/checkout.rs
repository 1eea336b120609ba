//! # Checkout
//!
//! Turns a cart into a committed order, moving stock and loyalty points in
//! the same SQLite transaction.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        checkout(request)                                │
//! │                                                                         │
//! │  1. validate lines and customer form            (no I/O)                │
//! │  2. subtotal = Σ unit_price × quantity                                  │
//! │  3. BEGIN IMMEDIATE ───────────────────────── write lock taken here     │
//! │  4. phone given? ──► LoyaltyLedger::lookup_or_create_in                 │
//! │  5. redemption > 0? ──► redeem_in(cap = subtotal)                       │
//! │     otherwise       ──► accrue_in(total)                                │
//! │  6. INSERT order                                                        │
//! │  7. per line: StockLedger::decrement_in, INSERT order_line              │
//! │  8. COMMIT                                                              │
//! │                                                                         │
//! │  Any error before 8 drops the transaction: SQLite rolls back the        │
//! │  order, the lines, the movements, the points and a new customer.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! `BEGIN IMMEDIATE` makes concurrent checkouts queue on the write lock
//! (for up to the pool's busy timeout). The second checkout reads the first
//! one's committed stock and balance, so the last unit of a product is sold
//! exactly once.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use cafe_core::validation::{validate_customer_name, validate_phone};
use cafe_core::{CheckoutReceipt, CheckoutRequest, LoyaltyPolicy, Money, Points};

use crate::error::{CheckoutError, CheckoutResult};
use crate::ledger::loyalty::LoyaltyLedger;
use crate::ledger::stock::{MovementSource, StockLedger};
use crate::repository::order::{NewOrder, OrderRepository};

/// The Order Transaction Coordinator.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    loyalty: LoyaltyLedger,
    timeout: Option<Duration>,
}

/// Loyalty side of one checkout.
#[derive(Debug, Default)]
struct LoyaltyOutcome {
    discount: Money,
    points_consumed: Points,
    points_accrued: Points,
    balance_after: Option<Points>,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool, policy: LoyaltyPolicy) -> Self {
        CheckoutService {
            loyalty: LoyaltyLedger::new(pool.clone(), policy),
            pool,
            timeout: None,
        }
    }

    /// Abandons (and rolls back) any checkout still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Commits the sale described by `request`, or nothing at all.
    pub async fn checkout(&self, request: &CheckoutRequest) -> CheckoutResult<CheckoutReceipt> {
        let subtotal = validate_request(request)?;

        debug!(
            lines = request.lines.len(),
            subtotal = %subtotal,
            anonymous = request.customer.is_anonymous(),
            "Checkout started"
        );

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.commit(request, subtotal))
                .await
                .unwrap_or(Err(CheckoutError::TimedOut(limit))),
            None => self.commit(request, subtotal).await,
        };

        match &result {
            Ok(receipt) => info!(
                order_id = receipt.order_id(),
                total = %receipt.final_total(),
                discount = %receipt.discount_applied,
                points_consumed = %receipt.points_consumed,
                points_accrued = %receipt.points_accrued,
                payment_method = %receipt.order.payment_method,
                "Checkout committed"
            ),
            Err(e) => warn!(
                error = %e,
                retryable = e.is_retryable(),
                "Checkout aborted"
            ),
        }

        result
    }

    async fn commit(&self, request: &CheckoutRequest, subtotal: Money) -> CheckoutResult<CheckoutReceipt> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let customer = if request.customer.is_anonymous() {
            None
        } else {
            Some(self.loyalty.lookup_or_create_in(&mut tx, &request.customer).await?)
        };

        let loyalty = match &customer {
            None => LoyaltyOutcome::default(),
            Some(customer) => {
                let requested = request
                    .redemption
                    .map(|r| r.resolve(customer.points()))
                    .filter(Points::is_positive);

                match requested {
                    Some(points) => {
                        let redemption = self
                            .loyalty
                            .redeem_in(&mut tx, customer.id, points, Some(subtotal))
                            .await?;
                        LoyaltyOutcome {
                            discount: redemption.discount,
                            points_consumed: redemption.points_consumed,
                            points_accrued: Points::zero(),
                            balance_after: Some(redemption.balance_after),
                        }
                    }
                    None => {
                        let accrual = self.loyalty.accrue_in(&mut tx, customer.id, subtotal).await?;
                        LoyaltyOutcome {
                            discount: Money::zero(),
                            points_consumed: Points::zero(),
                            points_accrued: accrual.points_accrued,
                            balance_after: Some(accrual.balance_after),
                        }
                    }
                }
            }
        };

        let total = subtotal.saturating_sub(loyalty.discount);

        let order = OrderRepository::insert_order_in(
            &mut tx,
            &NewOrder {
                customer_id: customer.as_ref().map(|c| c.id),
                subtotal,
                discount: loyalty.discount,
                total,
                points_redeemed: loyalty.points_consumed,
                points_accrued: loyalty.points_accrued,
                payment_method: request.payment_method,
                created_by: request.actor_id,
                created_at: Utc::now(),
            },
        )
        .await?;

        let source = MovementSource::sale(order.id, request.actor_id);
        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            StockLedger::decrement_in(&mut tx, line.product_id, line.quantity, source).await?;
            lines.push(OrderRepository::insert_line_in(&mut tx, order.id, line).await?);
        }

        tx.commit().await?;

        Ok(CheckoutReceipt {
            order,
            lines,
            discount_applied: loyalty.discount,
            points_consumed: loyalty.points_consumed,
            points_accrued: loyalty.points_accrued,
            new_loyalty_balance: loyalty.balance_after,
        })
    }
}

/// Checks everything that can be checked without the database and returns
/// the subtotal.
fn validate_request(request: &CheckoutRequest) -> CheckoutResult<Money> {
    if request.lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut subtotal = Money::zero();
    for line in &request.lines {
        if line.quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        if line.unit_price_cents < 0 {
            return Err(CheckoutError::InvalidUnitPrice {
                product_id: line.product_id,
            });
        }
        // A quantity whose total cannot be represented is rejected, not wrapped.
        subtotal = line
            .checked_line_total()
            .and_then(|total| subtotal.checked_add(total))
            .ok_or(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            })?;
    }

    if !request.customer.is_anonymous() {
        validate_phone(request.customer.phone_key()).map_err(CheckoutError::InvalidCustomer)?;
        validate_customer_name(&request.customer.name).map_err(CheckoutError::InvalidCustomer)?;
    }

    Ok(subtotal)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cafe_core::{CheckoutLine, CustomerInput, PaymentMethod};

    fn line(product_id: i64, price_major: i64, quantity: i64) -> CheckoutLine {
        CheckoutLine::new(product_id, Money::from_major(price_major), quantity)
    }

    #[test]
    fn test_validate_empty_cart() {
        let request = CheckoutRequest::new(vec![], PaymentMethod::Cash, 1);
        assert!(matches!(validate_request(&request), Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_validate_quantity_and_price() {
        let request = CheckoutRequest::new(vec![line(1, 10_000, 1), line(2, 10_000, 0)], PaymentMethod::Cash, 1);
        assert!(matches!(
            validate_request(&request),
            Err(CheckoutError::InvalidQuantity { product_id: 2, quantity: 0 })
        ));

        let request = CheckoutRequest::new(
            vec![CheckoutLine {
                product_id: 3,
                unit_price_cents: -1,
                quantity: 1,
            }],
            PaymentMethod::Cash,
            1,
        );
        assert!(matches!(
            validate_request(&request),
            Err(CheckoutError::InvalidUnitPrice { product_id: 3 })
        ));
    }

    #[test]
    fn test_validate_rejects_overflowing_totals() {
        let request = CheckoutRequest::new(
            vec![line(1, 10_000, 1), line(2, 50_000, 10_000_000_000_000)],
            PaymentMethod::Cash,
            1,
        );
        assert!(matches!(
            validate_request(&request),
            Err(CheckoutError::InvalidQuantity { product_id: 2, quantity: 10_000_000_000_000 })
        ));

        let big = Money::from_cents(i64::MAX / 2 + 1);
        let request = CheckoutRequest::new(
            vec![CheckoutLine::new(1, big, 1), CheckoutLine::new(2, big, 1)],
            PaymentMethod::Cash,
            1,
        );
        assert!(matches!(
            validate_request(&request),
            Err(CheckoutError::InvalidQuantity { product_id: 2, quantity: 1 })
        ));
    }

    #[test]
    fn test_validate_customer_form() {
        let request = CheckoutRequest::new(vec![line(1, 10_000, 1)], PaymentMethod::Cash, 1)
            .with_customer(CustomerInput::new("Lan", "phone?"));
        assert!(matches!(
            validate_request(&request),
            Err(CheckoutError::InvalidCustomer(_))
        ));
    }

    #[test]
    fn test_validate_returns_subtotal() {
        let request = CheckoutRequest::new(
            vec![line(1, 50_000, 2), line(2, 0, 1)],
            PaymentMethod::Card,
            1,
        );
        assert_eq!(validate_request(&request).unwrap(), Money::from_major(100_000));
    }
}
