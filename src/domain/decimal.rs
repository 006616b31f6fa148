//! Lossless decimal type for business volume and money, backed by rust_decimal.
//!
//! Values persist as canonical strings (no exponent, no trailing zeros) and
//! serialize to JSON numbers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An amount whose result falls outside the representable decimal range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("amount out of range: {0}")]
pub struct AmountOverflow(pub String);

/// Lossless decimal for volumes, balances and payout amounts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format as a canonical string (no exponent notation, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn min(self, other: Decimal) -> Decimal {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// Number of whole `unit`s contained in `self`, rounded down.
    ///
    /// Returns 0 for a non-positive `unit` or a non-positive value.
    pub fn whole_units(&self, unit: Decimal) -> u64 {
        if !unit.is_positive() || !self.is_positive() {
            return 0;
        }
        (self.0 / unit.0).floor().to_u64().unwrap_or(u64::MAX)
    }

    /// `self + rhs`, failing instead of panicking when out of range.
    pub fn try_add(self, rhs: Decimal) -> Result<Decimal, AmountOverflow> {
        self.0
            .checked_add(rhs.0)
            .map(Decimal)
            .ok_or_else(|| AmountOverflow(format!("{} + {}", self, rhs)))
    }

    /// `self + rhs`, clamped to the representable range.
    pub fn saturating_add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0.saturating_add(rhs.0))
    }

    /// `self` percent of `base`, i.e. `base * self / 100`.
    pub fn percent_of(&self, base: Decimal) -> Result<Decimal, AmountOverflow> {
        (self.0 / RustDecimal::ONE_HUNDRED)
            .checked_mul(base.0)
            .map(Decimal)
            .ok_or_else(|| AmountOverflow(format!("{}% of {}", self, base)))
    }

    /// Sum of `values`, failing on the first out-of-range partial total.
    pub fn try_sum<I>(values: I) -> Result<Decimal, AmountOverflow>
    where
        I: IntoIterator<Item = Decimal>,
    {
        values
            .into_iter()
            .try_fold(Decimal::zero(), |acc, value| acc.try_add(value))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}
