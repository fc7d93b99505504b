//! # Money Module
//!
//! Provides the `Money` and `Rate` types for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In many retail systems:                                                │
//! │    ₦10.00 / 3 = ₦3.33 (×3 = ₦9.99)  → Lost ₦0.01!                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Kobo                                             │
//! │    1000 kobo / 3 = 333 kobo (×3 = 999 kobo)                            │
//! │    We KNOW we lost 1 kobo, and handle it explicitly                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Policy
//! All percentage math rounds HALF UP at kobo precision. This matches how the
//! tax breakdown is reported to the tax authority; banker's rounding is NOT
//! used anywhere in this codebase.
//!
//! ## Usage
//! ```rust
//! use sable_core::money::{Money, Rate};
//!
//! // Create from kobo (preferred)
//! let price = Money::from_kobo(1_075_000); // ₦10,750.00
//!
//! // Percentage of an amount (round half up)
//! let vat = price.percent_of(Rate::from_bps(750)); // 7.5%
//! assert_eq!(vat.kobo(), 80_625);
//!
//! // NEVER do this:
//! // let bad = Money::from_float(10.99); // NO SUCH METHOD EXISTS!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (kobo).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds, adjustments
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

/// Divides rounding half up. `den` must be positive.
#[inline]
fn div_half_up(num: i128, den: i128) -> i64 {
    ((num + den / 2) / den) as i64
}

impl Money {
    /// Creates a Money value from kobo (the smallest currency unit).
    #[inline]
    pub const fn from_kobo(kobo: i64) -> Self {
        Money(kobo)
    }

    /// Creates a Money value from whole naira.
    ///
    /// ## Example
    /// ```rust
    /// use sable_core::money::Money;
    ///
    /// let price = Money::from_naira(10_750);
    /// assert_eq!(price.kobo(), 1_075_000);
    /// ```
    #[inline]
    pub const fn from_naira(naira: i64) -> Self {
        Money(naira * 100)
    }

    /// Creates a Money value from major and minor units (naira and kobo).
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    /// `from_naira_kobo(-5, 50)` = -₦5.50, not -₦4.50
    #[inline]
    pub const fn from_naira_kobo(naira: i64, kobo: i64) -> Self {
        if naira < 0 {
            Money(naira * 100 - kobo)
        } else {
            Money(naira * 100 + kobo)
        }
    }

    /// Returns the value in kobo (smallest currency unit).
    #[inline]
    pub const fn kobo(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (naira) portion.
    #[inline]
    pub const fn naira_part(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (kobo) portion (always 0-99).
    #[inline]
    pub const fn kobo_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps a negative value to zero. Balances never go below zero.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Absolute difference between two amounts.
    #[inline]
    pub const fn diff(&self, other: Money) -> Money {
        Money((self.0 - other.0).abs())
    }

    /// Calculates a percentage of this amount, rounding half up.
    ///
    /// ## Implementation
    /// Integer math in i128 to prevent overflow on large amounts:
    /// `(amount * bps + 5000) / 10000`
    ///
    /// ## Example
    /// ```rust
    /// use sable_core::money::{Money, Rate};
    ///
    /// let base = Money::from_naira(10_000);
    /// let tax = base.percent_of(Rate::from_bps(750)); // 7.5%
    /// assert_eq!(tax, Money::from_naira(750));
    /// ```
    pub fn percent_of(&self, rate: Rate) -> Money {
        Money(div_half_up(self.0 as i128 * rate.bps() as i128, 10_000))
    }

    /// Extracts the tax already embedded in this (tax-inclusive) amount.
    ///
    /// For a price P carrying an inclusive percentage tax at rate r:
    /// `tax = P − P / (1 + r)`. The base is rounded half up, so
    /// `extracted_tax + (P − extracted_tax) == P` holds exactly.
    ///
    /// ## Example
    /// ```rust
    /// use sable_core::money::{Money, Rate};
    ///
    /// // ₦10,750 including 7.5% VAT → ₦750 of tax was inside the price
    /// let gross = Money::from_naira(10_750);
    /// let tax = gross.extract_inclusive(Rate::from_bps(750));
    /// assert_eq!(tax, Money::from_naira(750));
    /// ```
    pub fn extract_inclusive(&self, rate: Rate) -> Money {
        let base = div_half_up(
            self.0 as i128 * 10_000,
            10_000 + rate.bps() as i128,
        );
        Money(self.0 - base)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A percentage rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 750 bps = 7.5% (e.g., Nigerian VAT)
///
/// Used for tax rates, bill-level discounts, and loyalty discount caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    pub fn from_percent(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// 100% expressed in basis points.
    pub const FULL: Rate = Rate(10_000);

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Caps this rate at `max`.
    #[inline]
    pub fn min(self, max: Rate) -> Rate {
        Rate(self.0.min(max.0))
    }

    /// Multiplies the rate by an integer factor (count-threshold discounts).
    #[inline]
    pub const fn multiply(self, factor: i64) -> Rate {
        Rate(self.0.saturating_mul(factor as u32))
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for receipts and logs. Naira part is grouped in thousands:
/// `₦10,750.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}₦{}.{:02}",
            sign,
            group_thousands(self.naira_part().abs()),
            self.kobo_part()
        )
    }
}

/// Groups a non-negative integer into comma-separated thousands.
fn group_thousands(n: i64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Default money is zero.
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kobo() {
        let money = Money::from_kobo(1099);
        assert_eq!(money.kobo(), 1099);
        assert_eq!(money.naira_part(), 10);
        assert_eq!(money.kobo_part(), 99);
    }

    #[test]
    fn test_from_naira_kobo() {
        let money = Money::from_naira_kobo(10, 99);
        assert_eq!(money.kobo(), 1099);

        let negative = Money::from_naira_kobo(-5, 50);
        assert_eq!(negative.kobo(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_kobo(1099)), "₦10.99");
        assert_eq!(format!("{}", Money::from_naira(10_750)), "₦10,750.00");
        assert_eq!(format!("{}", Money::from_naira(1_234_567)), "₦1,234,567.00");
        assert_eq!(format!("{}", Money::from_kobo(-550)), "-₦5.50");
        assert_eq!(format!("{}", Money::zero()), "₦0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_kobo(1000);
        let b = Money::from_kobo(500);

        assert_eq!((a + b).kobo(), 1500);
        assert_eq!((a - b).kobo(), 500);
        assert_eq!((a * 3).kobo(), 3000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.kobo(), 2000);
    }

    #[test]
    fn test_percent_of_exact() {
        // ₦10,000 at 7.5% = ₦750 exactly
        let base = Money::from_naira(10_000);
        assert_eq!(base.percent_of(Rate::from_bps(750)), Money::from_naira(750));
    }

    #[test]
    fn test_percent_of_rounds_half_up() {
        // ₦10.00 at 8.25% = ₦0.825 → ₦0.83 (half up, NOT banker's)
        let amount = Money::from_kobo(1000);
        let tax = amount.percent_of(Rate::from_bps(825));
        assert_eq!(tax.kobo(), 83);

        // 2.5 kobo rounds up to 3, not to even 2
        let amount = Money::from_kobo(50);
        assert_eq!(amount.percent_of(Rate::from_bps(500)).kobo(), 3);
    }

    #[test]
    fn test_extract_inclusive() {
        // ₦10,750 with 7.5% inside: 10,750 − 10,750/1.075 = 750
        let gross = Money::from_naira(10_750);
        let tax = gross.extract_inclusive(Rate::from_bps(750));
        assert_eq!(tax, Money::from_naira(750));

        // Round trip: extracted + remainder equals the original, exactly
        assert_eq!(tax + (gross - tax), gross);
    }

    #[test]
    fn test_extract_inclusive_round_trip_odd_amounts() {
        for kobo in [1, 99, 101, 1_234_567, 99_999_999] {
            let gross = Money::from_kobo(kobo);
            let tax = gross.extract_inclusive(Rate::from_bps(750));
            assert_eq!(tax + (gross - tax), gross, "leaked at {kobo}");
            assert!(!tax.is_negative());
        }
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_kobo(-5).floor_zero(), Money::zero());
        assert_eq!(Money::from_kobo(5).floor_zero(), Money::from_kobo(5));
    }

    #[test]
    fn test_rate_conversions() {
        let rate = Rate::from_bps(750);
        assert!((rate.percent() - 7.5).abs() < 0.001);
        assert_eq!(Rate::from_percent(7.5), rate);
        assert_eq!(rate.multiply(3).bps(), 2250);
        assert_eq!(rate.multiply(20).min(Rate::from_bps(5000)).bps(), 5000);
    }

    /// Documents the intentional precision loss on division.
    #[test]
    fn test_division_precision_loss_documented() {
        let ten_naira = Money::from_kobo(1000);
        let one_third = Money::from_kobo(1000 / 3); // 333 kobo
        let reconstructed = one_third * 3; // 999 kobo

        assert_eq!(reconstructed.kobo(), 999);
        assert_eq!((ten_naira - reconstructed).kobo(), 1);
    }
}
