//! Money represented in integer minor currency units.

use serde::{Deserialize, Serialize};

/// A monetary amount in minor currency units (e.g. cents, won).
///
/// Stored as an integer to avoid floating-point rounding in totals.
/// Operator arithmetic saturates instead of wrapping, so a sum can never
/// silently flip sign; callers that accept outside input validate with
/// the `checked_*` methods before an amount is stored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub fn from_minor(amount: i64) -> Self {
        Self(amount)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies the amount by a quantity, saturating at the range ends.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Multiplies the amount by a quantity, `None` on overflow.
    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Adds two amounts, `None` on overflow.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_minor_and_back() {
        let m = Money::from_minor(12500);
        assert_eq!(m.minor(), 12500);
        assert!(m.is_positive());
    }

    #[test]
    fn zero_is_zero() {
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);
        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!(a.multiply(3).minor(), 3000);
    }

    #[test]
    fn checked_ops_reject_overflow() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!(max.checked_mul(2), None);
        assert_eq!(max.checked_add(Money::from_minor(1)), None);
        assert_eq!(
            Money::from_minor(1000).checked_mul(3),
            Some(Money::from_minor(3000))
        );
    }

    #[test]
    fn operator_arithmetic_saturates_instead_of_wrapping() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!((max + Money::from_minor(1)).minor(), i64::MAX);
        assert_eq!(max.multiply(2).minor(), i64::MAX);
        assert!((max + max).is_positive());
    }

    #[test]
    fn sum_of_items() {
        let total: Money = [100, 200, 300]
            .iter()
            .map(|&m| Money::from_minor(m))
            .sum();
        assert_eq!(total.minor(), 600);
    }

    #[test]
    fn serialization_is_transparent() {
        let m = Money::from_minor(999);
        assert_eq!(serde_json::to_string(&m).unwrap(), "999");
    }
}
