//! Money amounts in integer cents.

use serde::{Deserialize, Serialize};

/// An amount of money in cents (1000 = $10.00).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Highest unit price accepted for a line: $1,000,000.00.
    pub const MAX_UNIT_PRICE: Money = Money { cents: 100_000_000 };

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Zero or more, and at most [`Money::MAX_UNIT_PRICE`].
    pub fn is_valid_unit_price(&self) -> bool {
        (0..=Self::MAX_UNIT_PRICE.cents).contains(&self.cents)
    }

    /// Price of `quantity` units at this unit price. Saturates instead of
    /// overflowing.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
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
    fn arithmetic_saturates_on_huge_amounts() {
        let huge = Money::from_cents(i64::MAX);
        assert_eq!(huge.multiply(2), huge);
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge + Money::from_cents(1), huge);

        let mut total = Money::from_cents(i64::MAX - 1);
        total += Money::from_cents(5);
        assert_eq!(total, huge);
        assert_eq!(
            Money::from_cents(250).checked_multiply(4),
            Some(Money::from_cents(1000))
        );
    }

    #[test]
    fn unit_price_bounds() {
        assert!(Money::zero().is_valid_unit_price());
        assert!(Money::MAX_UNIT_PRICE.is_valid_unit_price());
        assert!(!Money::from_cents(-1).is_valid_unit_price());
        assert!(!Money::from_cents(i64::MAX).is_valid_unit_price());
    }

    #[test]
    fn multiply_and_sum() {
        let lines = [Money::from_cents(1000).multiply(2), Money::from_cents(250)];
        let total: Money = lines.into_iter().sum();
        assert_eq!(total.cents(), 2250);
    }

    #[test]
    fn display_formats_dollars() {
        assert_eq!(Money::from_cents(2005).to_string(), "$20.05");
        assert_eq!(Money::from_cents(-150).to_string(), "-$1.50");
    }

    #[test]
    fn serializes_as_plain_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(999)).unwrap(), "999");
    }
}
