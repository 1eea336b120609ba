//! # Loyalty Points
//!
//! Point balances are fixed-point numbers with 2 decimal places, stored as an
//! integer count of hundredths. A 100 000 sale earns half a point, which is
//! `Points::from_hundredths(50)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

/// A loyalty point amount in hundredths of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Points(i64);

impl Points {
    /// Creates a point amount from hundredths of a point.
    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Points(hundredths)
    }

    /// Creates a point amount from whole points.
    ///
    /// ## Example
    /// ```rust
    /// use cafe_core::points::Points;
    ///
    /// assert_eq!(Points::whole(3).hundredths(), 300);
    /// ```
    #[inline]
    pub const fn whole(points: i64) -> Self {
        Points(points.saturating_mul(100))
    }

    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Points(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Default for Points {
    fn default() -> Self {
        Points::zero()
    }
}

impl Add for Points {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Points(self.0 + other.0)
    }
}

impl AddAssign for Points {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Points {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Points(self.0 - other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_two_decimals() {
        assert_eq!(Points::from_hundredths(50).to_string(), "0.50");
        assert_eq!(Points::whole(5).to_string(), "5.00");
        assert_eq!(Points::from_hundredths(1234).to_string(), "12.34");
    }

    #[test]
    fn test_arithmetic_and_ordering() {
        let balance = Points::whole(5);
        let spent = Points::whole(3);
        assert_eq!(balance - spent, Points::whole(2));
        assert!(spent < balance);
        assert_eq!(Points::zero() + Points::from_hundredths(50), Points::from_hundredths(50));
    }

    #[test]
    fn test_whole_saturates() {
        assert_eq!(Points::whole(i64::MAX).hundredths(), i64::MAX);
        assert_eq!(Points::whole(i64::MIN).hundredths(), i64::MIN);
    }
}
