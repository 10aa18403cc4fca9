use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

use serde::{Deserialize, Serialize};

/// Amount in minor currency units (cents). All pricing arithmetic stays integral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Whole currency units, e.g. `from_major(1500)` is 1500.00.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `bps` basis points of this amount (1500 = 15%), rounded half away from zero.
    pub fn percent_bps(&self, bps: u32) -> Money {
        let scaled = self.0 as i128 * bps as i128;
        let rounded = if scaled >= 0 {
            (scaled + 5_000) / 10_000
        } else {
            (scaled - 5_000) / 10_000
        };
        Money(rounded as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, qty: i64) -> Money {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Money::from_minor(150_050).to_string(), "1500.50");
        assert_eq!(Money::from_minor(7).to_string(), "0.07");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
    }

    #[test]
    fn arithmetic() {
        let mut total = Money::from_major(10) + Money::from_minor(99);
        total += Money::from_minor(1);
        assert_eq!(total, Money::from_major(11));
        assert_eq!(Money::from_minor(299) * 3, Money::from_minor(897));
        let sum: Money = [Money::from_minor(1), Money::from_minor(2)].iter().sum();
        assert_eq!(sum, Money::from_minor(3));
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        // 15% of 1.00 = 0.15 exactly
        assert_eq!(Money::from_minor(100).percent_bps(1500), Money::from_minor(15));
        // 15% of 0.03 = 0.0045 -> 0.00
        assert_eq!(Money::from_minor(3).percent_bps(1500), Money::ZERO);
        // 15% of 0.10 = 0.015 -> 0.02
        assert_eq!(Money::from_minor(10).percent_bps(1500), Money::from_minor(2));
        assert_eq!(Money::from_minor(-10).percent_bps(1500), Money::from_minor(-2));
    }

    #[test]
    fn percent_of_large_amounts_does_not_overflow() {
        let big = Money::from_minor(i64::MAX / 2);
        let half = big.percent_bps(5000);
        assert_eq!(half.minor(), (i64::MAX / 2 + 1) / 2);
    }

    #[test]
    fn serde_is_transparent() {
        assert_eq!(serde_json::to_string(&Money::from_minor(1234)).unwrap(), "1234");
    }
}
