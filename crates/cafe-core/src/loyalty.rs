//! # Loyalty Arithmetic
//!
//! Pure point math shared by the Loyalty Ledger and the checkout coordinator.
//!
//! ## Earn or Burn
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One checkout, one path                              │
//! │                                                                         │
//! │  Customer known? ── no ──► anonymous sale, no points at all             │
//! │       │                                                                 │
//! │      yes                                                                │
//! │       │                                                                 │
//! │  Redemption requested (non-zero)?                                       │
//! │       │                                                                 │
//! │       ├── yes ──► BURN: discount = points × POINT_REDEMPTION_VALUE      │
//! │       │            capped at the subtotal, no accrual on this sale      │
//! │       │                                                                 │
//! │       └── no ───► EARN: points = total / POINT_ACCRUAL_UNIT             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All intermediate products are computed in `i128`; a single sale can be in
//! the tens of millions of cents and is multiplied by 100 for the point scale.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::points::Points;
use crate::validation::ValidationResult;

/// Sale amount that earns one point (200 000 currency units).
pub const POINT_ACCRUAL_UNIT: Money = Money::from_major(200_000);

/// Discount value of one redeemed point (10 000 currency units).
pub const POINT_REDEMPTION_VALUE: Money = Money::from_major(10_000);

// =============================================================================
// Policy
// =============================================================================

/// Exchange rates between money and points.
///
/// Defaults to [`POINT_ACCRUAL_UNIT`] and [`POINT_REDEMPTION_VALUE`]; stores
/// can override both in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyPolicy {
    /// Spend that earns exactly one point.
    pub accrual_unit: Money,
    /// Discount granted per redeemed point.
    pub point_value: Money,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        LoyaltyPolicy {
            accrual_unit: POINT_ACCRUAL_UNIT,
            point_value: POINT_REDEMPTION_VALUE,
        }
    }
}

impl LoyaltyPolicy {
    /// Builds a policy from whole-unit rates, validating both.
    pub fn from_major(accrual_unit: i64, point_value: i64) -> ValidationResult<Self> {
        let policy = LoyaltyPolicy {
            accrual_unit: Money::from_major(accrual_unit),
            point_value: Money::from_major(point_value),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Both rates must be strictly positive.
    pub fn validate(&self) -> ValidationResult<()> {
        if !self.accrual_unit.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "accrual_unit".to_string(),
            });
        }
        if !self.point_value.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "point_value".to_string(),
            });
        }
        Ok(())
    }

    /// Points earned by a sale of `total`.
    ///
    /// Fractional points are kept down to 0.01; anything finer is truncated.
    ///
    /// ## Example
    /// ```rust
    /// use cafe_core::loyalty::LoyaltyPolicy;
    /// use cafe_core::{Money, Points};
    ///
    /// let policy = LoyaltyPolicy::default();
    /// let earned = policy.accrual_for(Money::from_major(100_000));
    /// assert_eq!(earned, Points::from_hundredths(50)); // 0.50 points
    /// ```
    pub fn accrual_for(&self, total: Money) -> Points {
        if !total.is_positive() {
            return Points::zero();
        }
        let hundredths = total.cents() as i128 * 100 / self.accrual_unit.cents() as i128;
        Points::from_hundredths(saturate(hundredths))
    }

    /// Discount value of `points` with no cap applied.
    pub fn discount_for(&self, points: Points) -> Money {
        let cents = points.hundredths() as i128 * self.point_value.cents() as i128 / 100;
        Money::from_cents(saturate(cents))
    }

    /// Prices a redemption of `requested` points against an optional cap.
    ///
    /// When the full discount would exceed `cap` (the sale subtotal), only the
    /// points covering the cap are consumed and the discount equals the cap.
    ///
    /// ```text
    /// requested = 10 points, cap = 40 000
    ///   full discount 100 000 > 40 000
    ///   consumed = 40 000 / 10 000 = 4 points, discount = 40 000
    /// ```
    pub fn quote_redemption(&self, requested: Points, cap: Option<Money>) -> RedemptionQuote {
        let full = self.discount_for(requested);

        match cap {
            Some(cap) if full > cap => {
                let cap = if cap.is_negative() { Money::zero() } else { cap };
                let hundredths = cap.cents() as i128 * 100 / self.point_value.cents() as i128;
                RedemptionQuote {
                    points_consumed: Points::from_hundredths(saturate(hundredths)),
                    discount: cap,
                }
            }
            _ => RedemptionQuote {
                points_consumed: requested,
                discount: full,
            },
        }
    }
}

/// Narrows an intermediate product back to `i64`, clamping at the bounds.
fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

// =============================================================================
// Redemption
// =============================================================================

/// How many points the customer asked to redeem at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case", tag = "kind", content = "points")]
pub enum RedemptionRequest {
    /// A specific amount chosen by the cashier.
    Points(Points),
    /// Everything on the customer's balance ("use my points").
    EntireBalance,
}

impl RedemptionRequest {
    /// Resolves the request against the balance read inside the transaction.
    pub fn resolve(&self, balance: Points) -> Points {
        match self {
            RedemptionRequest::Points(points) => *points,
            RedemptionRequest::EntireBalance => balance,
        }
    }
}

/// Result of pricing a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RedemptionQuote {
    pub points_consumed: Points,
    pub discount: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accrual_keeps_fractional_points() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.accrual_for(Money::from_major(100_000)), Points::from_hundredths(50));
        assert_eq!(policy.accrual_for(Money::from_major(200_000)), Points::whole(1));
        assert_eq!(policy.accrual_for(Money::from_major(1_000)), Points::zero());
        assert_eq!(policy.accrual_for(Money::from_major(2_000)), Points::from_hundredths(1));
    }

    #[test]
    fn test_accrual_on_zero_total() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.accrual_for(Money::zero()), Points::zero());
    }

    #[test]
    fn test_redemption_under_cap() {
        let policy = LoyaltyPolicy::default();
        let quote = policy.quote_redemption(Points::whole(3), Some(Money::from_major(40_000)));
        assert_eq!(quote.points_consumed, Points::whole(3));
        assert_eq!(quote.discount, Money::from_major(30_000));
    }

    #[test]
    fn test_redemption_capped_at_subtotal() {
        let policy = LoyaltyPolicy::default();
        let quote = policy.quote_redemption(Points::whole(10), Some(Money::from_major(40_000)));
        assert_eq!(quote.points_consumed, Points::whole(4));
        assert_eq!(quote.discount, Money::from_major(40_000));
    }

    #[test]
    fn test_redemption_cap_with_fractional_points() {
        let policy = LoyaltyPolicy::default();
        let quote = policy.quote_redemption(Points::whole(10), Some(Money::from_major(45_000)));
        assert_eq!(quote.points_consumed, Points::from_hundredths(450));
        assert_eq!(quote.discount, Money::from_major(45_000));
    }

    #[test]
    fn test_uncapped_redemption() {
        let policy = LoyaltyPolicy::default();
        let quote = policy.quote_redemption(Points::from_hundredths(250), None);
        assert_eq!(quote.points_consumed, Points::from_hundredths(250));
        assert_eq!(quote.discount, Money::from_major(25_000));
    }

    #[test]
    fn test_resolve_entire_balance() {
        let balance = Points::from_hundredths(725);
        assert_eq!(RedemptionRequest::EntireBalance.resolve(balance), balance);
        assert_eq!(
            RedemptionRequest::Points(Points::whole(2)).resolve(balance),
            Points::whole(2)
        );
    }

    #[test]
    fn test_huge_amounts_saturate() {
        let policy = LoyaltyPolicy::default();
        let huge = Points::from_hundredths(i64::MAX / 2);
        assert_eq!(policy.discount_for(huge), Money::from_cents(i64::MAX));

        let quote = policy.quote_redemption(huge, None);
        assert_eq!(quote.discount, Money::from_cents(i64::MAX));

        let cheap = LoyaltyPolicy {
            accrual_unit: Money::from_cents(1),
            point_value: Money::from_cents(1),
        };
        assert_eq!(cheap.accrual_for(Money::from_cents(i64::MAX)), Points::from_hundredths(i64::MAX));
    }

    #[test]
    fn test_policy_validation() {
        assert!(LoyaltyPolicy::from_major(200_000, 10_000).is_ok());
        assert!(LoyaltyPolicy::from_major(0, 10_000).is_err());
        assert!(LoyaltyPolicy::from_major(200_000, -1).is_err());
    }
}
