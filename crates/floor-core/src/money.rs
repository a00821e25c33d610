//! # Money Module
//!
//! Prices and order line totals in integer cents.
//!
//! The floor never does tax or discount math; that belongs to the checkout
//! collaborator. Money here only needs to price a line
//! (`unit price × quantity`) and sum an order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::error::ValidationError;

/// A monetary value in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use floor_core::money::Money;
    ///
    /// let pizza = Money::from_cents(1250);
    /// assert_eq!(pizza.cents(), 1250);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Line total for `qty` units at this unit price.
    ///
    /// ```rust
    /// use floor_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1250).multiply_quantity(3).unwrap().cents(), 3750);
    /// assert!(Money::from_cents(i64::MAX / 2).multiply_quantity(3).is_err());
    /// ```
    pub fn multiply_quantity(&self, qty: i64) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(qty)
            .map(Money)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "line total".to_string(),
                min: i64::MIN,
                max: i64::MAX,
            })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
    }

    #[test]
    fn test_order_total() {
        let lines = [
            Money::from_cents(1250).multiply_quantity(3).unwrap(),
            Money::from_cents(450).multiply_quantity(2).unwrap(),
        ];
        let total: Money = lines.into_iter().sum();
        assert_eq!(total.cents(), 4650);
    }

    #[test]
    fn test_line_total_overflow_is_an_error() {
        let err = Money::from_cents(i64::MAX / 2).multiply_quantity(3).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange { ref field, .. } if field == "line total"
        ));
    }
}
