//! # Quantity Module
//!
//! Fixed-point stock quantities.
//!
//! ## Why Thousandths?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE RECONCILIATION PROBLEM                                             │
//! │                                                                         │
//! │  Ledger invariant:                                                      │
//! │    stock.quantity == initial + Σ movement.change                        │
//! │                                                                         │
//! │  With f64:  0.1 + 0.2 - 0.3 = 0.00000000000000005   ❌ never balances   │
//! │                                                                         │
//! │  OUR SOLUTION: integer thousandths of the stock's unit                  │
//! │    0.100 kg = 100, 0.200 kg = 200, 0.300 kg = 300                       │
//! │    100 + 200 - 300 = 0                              ✅ exact            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Three decimals cover grams per kilogram and millilitres per litre, which is
//! the finest unit a recipe line is written in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::error::ValidationError;

/// Number of stored units per whole unit of measure.
pub const QUANTITY_SCALE: i64 = 1000;

fn overflow(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: i64::MIN,
        max: i64::MAX,
    }
}

/// A stock quantity in thousandths of the stock's unit of measure.
///
/// Signed, so the same type carries on-hand amounts and ledger deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from whole units.
    ///
    /// ```rust
    /// use floor_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::from_units(10).milli(), 10_000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * QUANTITY_SCALE)
    }

    /// Creates a quantity from thousandths.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Returns the raw value in thousandths.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a per-unit quantity by a count of units.
    ///
    /// Used for `recipe quantity × item quantity`.
    ///
    /// ```rust
    /// use floor_core::quantity::Quantity;
    ///
    /// let per_pizza = Quantity::from_milli(2_000);
    /// assert_eq!(per_pizza.times(3).unwrap(), Quantity::from_units(6));
    /// assert!(Quantity::from_milli(i64::MAX / 2).times(3).is_err());
    /// ```
    pub fn times(&self, count: i64) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(count)
            .map(Quantity)
            .ok_or_else(|| overflow("quantity"))
    }

    /// Adds two quantities, failing instead of wrapping.
    pub fn checked_add(self, other: Self) -> Result<Self, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Quantity)
            .ok_or_else(|| overflow("quantity"))
    }

    /// Parses a decimal string with at most three fractional digits.
    ///
    /// ## Accepted
    /// `"10"`, `"2.5"`, `"0.125"`, `"-1.5"`
    ///
    /// ## Rejected
    /// `""`, `"abc"`, `"1.2345"` (finer than a thousandth), `"1e3"`
    ///
    /// ```rust
    /// use floor_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::parse("2.5").unwrap().milli(), 2_500);
    /// assert!(Quantity::parse("0.0001").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "quantity".to_string(),
            });
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("expected digits"));
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return Err(invalid("expected a decimal number"));
        }
        if fraction.len() > 3 {
            return Err(invalid("at most three decimal places"));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("number too large"))?
        };
        let fraction_value: i64 = if fraction.is_empty() {
            0
        } else {
            // "5" → 500, "25" → 250, "125" → 125
            let padded = format!("{:0<3}", fraction);
            padded.parse().map_err(|_| invalid("expected a decimal number"))?
        };

        let milli = whole_value
            .checked_mul(QUANTITY_SCALE)
            .and_then(|w| w.checked_add(fraction_value))
            .ok_or_else(|| invalid("number too large"))?;

        Ok(Quantity(if negative { -milli } else { milli }))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:03}",
            sign,
            abs / QUANTITY_SCALE as u64,
            abs % QUANTITY_SCALE as u64
        )
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
