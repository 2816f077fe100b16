use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100)).to_i64().unwrap()
    }

    /// Rounds to two decimal places on the way in; statement amounts never
    /// carry more precision than cents.
    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn to_decimal(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub fn abs_diff(self, other: Self) -> Self {
        Money((self.0 - other.0).abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cents_round_trip() {
        assert_eq!(Money::from_cents(12345).to_cents(), 12345);
        assert_eq!(Money::from_cents(-500).to_cents(), -500);
    }

    #[test]
    fn from_decimal_rounds_to_cents() {
        let m = Money::from_decimal(Decimal::new(123456, 4)); // 12.3456
        assert_eq!(m.to_cents(), 1235);
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(750);
        assert_eq!(a.abs_diff(b), b.abs_diff(a));
        assert_eq!(a.abs_diff(b).to_cents(), 250);
    }

    #[test]
    fn add_and_sub() {
        let a = Money::from_cents(150);
        let b = Money::from_cents(50);
        assert_eq!((a + b).to_cents(), 200);
        assert_eq!((a - b).to_cents(), 100);
    }

    #[test]
    fn sign_predicates() {
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
    }

    #[test]
    fn display_two_decimals() {
        assert_eq!(Money::from_cents(500000).to_string(), "5000.00");
        assert_eq!(Money::zero().to_string(), "0.00");
    }
}
