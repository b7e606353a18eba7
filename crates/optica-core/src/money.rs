//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A register that sums 0.1 + 0.2 in floating point ends the day with    │
//! │  0.30000000000000004 and a "difference" nobody can explain.            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every order total, payment and register balance is an i64 of cents. │
//! │    Decimal amounts only exist at the Mercado Pago boundary.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use optica_core::money::{Money, Rate};
//!
//! let frame = Money::from_cents(45_000);
//! let lenses = Money::from_cents(30_050);
//! let total = frame + lenses;
//! assert_eq!(total.cents(), 75_050);
//!
//! // 12% card surcharge
//! let surcharge = total.apply_rate(Rate::from_bps(1200));
//! assert_eq!(surcharge.cents(), 9_006);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Rate
// =============================================================================

/// A rate expressed in basis points (1 bps = 0.01%).
///
/// Used for installment interest on credit card payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values represent reversals and register deltas
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// ## Where Money Flows
/// ```text
/// OrderItem.unit_price ──► Order.total ──► Order balance ──► Payment.amount
///                                                              │
///                          CashRegister running totals ◄───────┘
///                          CashRegister expected balance ◄─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use optica_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
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

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns zero when the value is negative.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Applies a basis-point rate, rounding half up.
    ///
    /// `(amount * bps + 5000) / 10000`, computed in i128 so large register
    /// totals cannot overflow.
    ///
    /// ```rust
    /// use optica_core::money::{Money, Rate};
    ///
    /// let amount = Money::from_cents(1000);
    /// assert_eq!(amount.apply_rate(Rate::from_bps(825)).cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Divides into `parts`, rounding up so that `parts` payments always
    /// cover the amount.
    ///
    /// Returns `None` when `parts` is zero.
    ///
    /// ```rust
    /// use optica_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1000).div_ceil(3).unwrap().cents(), 334);
    /// ```
    pub fn div_ceil(&self, parts: u32) -> Option<Money> {
        if parts == 0 {
            return None;
        }
        let parts = parts as i64;
        let quotient = self.0 / parts;
        let remainder = self.0 % parts;
        if remainder > 0 {
            Some(Money(quotient + 1))
        } else {
            Some(Money(quotient))
        }
    }

    /// Multiplies money by a quantity. `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented formatting. Localised display happens in the web UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((-a).cents(), -1000);
        assert_eq!((a * 3).cents(), 3000);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_cents(2500);
        assert_eq!(price.checked_multiply_quantity(3), Some(Money::from_cents(7500)));
        assert_eq!(Money::from_cents(i64::MAX / 2 + 1).checked_multiply_quantity(2), None);

        assert_eq!(price.checked_add(price), Some(Money::from_cents(5000)));
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        let amount = Money::from_cents(1000);
        assert_eq!(amount.apply_rate(Rate::from_bps(1000)).cents(), 100);
        assert_eq!(amount.apply_rate(Rate::from_bps(825)).cents(), 83);
        assert_eq!(amount.apply_rate(Rate::zero()).cents(), 0);
    }

    #[test]
    fn test_div_ceil() {
        assert_eq!(Money::from_cents(1000).div_ceil(3), Some(Money::from_cents(334)));
        assert_eq!(Money::from_cents(900).div_ceil(3), Some(Money::from_cents(300)));
        assert_eq!(Money::from_cents(900).div_ceil(0), None);
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from_cents(100), Money::from_cents(250), Money::from_cents(-50)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.cents(), 300);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_cents(-10).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_cents(10).clamp_non_negative().cents(), 10);
    }
}
