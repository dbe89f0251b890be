//! # Money Module
//!
//! The `Money` type for invoice prices, discounts, taxes and production
//! costs.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Invoice line:  price 1250 × qty 3  =  3750                             │
//! │  Header:        Σ lines − discount + tax  =  total_price                │
//! │                                                                         │
//! │  Everything is whole minor units (cents). Quantities may be             │
//! │  fractional (unit conversion), so `times_quantity` is the ONE place     │
//! │  where a float meets money, and it rounds half away from zero.          │
//! │                                                                         │
//! │  Document totals use the `checked_*` forms: an overflow is a bad        │
//! │  payload, reported as a validation error, never a panic.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharmacon_core::money::Money;
//!
//! let price = Money::from_cents(1250);
//! let line = price.times_quantity(3.0).unwrap() - Money::from_cents(50);
//! assert_eq!(line.cents(), 3700);
//! assert_eq!(line.to_string(), "37.00");
//! assert!(Money::from_cents(i64::MAX).checked_add(line).is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Serialized as a bare integer so JSON payloads carry `1250`, not an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a (possibly fractional) quantity.
    ///
    /// Rounds half away from zero to whole cents. `None` when the product
    /// is not finite or does not fit in an `i64`.
    pub fn times_quantity(&self, quantity: f64) -> Option<Money> {
        let product = (self.0 as f64 * quantity).round();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        if product.is_finite() && product >= i64::MIN as f64 && product < i64::MAX as f64 {
            Some(Money(product as i64))
        } else {
            None
        }
    }

    #[inline]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Sums line amounts, `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount))
    }
}

/// Display shows major.minor with two decimals, e.g. `-5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Money(cents)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
