//! # Money
//!
//! Every amount in the engine is an integer count of paise. Percentages
//! (GST, commission) are applied with integer math and rounded once,
//! half-up, at the point they are applied:
//!
//! ```text
//! 33333 paise × 1800 bps = 59_999_400 / 10_000 = 5999.94 → 6000
//! CGST 3000 + SGST 3000 = 6000
//! ```
//!
//! ```rust
//! use labbill_core::money::Money;
//!
//! let cbc = Money::from_rupees(350);
//! let lipid = Money::from_paise(89_950);
//! assert_eq!((cbc + lipid).to_string(), "₹1249.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Percentage;

/// An amount in paise. Signed, because an invoice edit can move the paid
/// amount down and the adjustment records the negative delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
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

    /// `self × rate`, rounded half-up to the paisa.
    ///
    /// ```rust
    /// use labbill_core::money::Money;
    /// use labbill_core::types::Percentage;
    ///
    /// let gst = Percentage::from_bps(1800);
    /// assert_eq!(Money::from_paise(33_333).apply_percentage(gst).paise(), 6000);
    /// assert_eq!(Money::from_paise(25).apply_percentage(gst).paise(), 5);
    /// ```
    pub fn apply_percentage(&self, rate: Percentage) -> Money {
        // i128: a crore-rupee invoice times 10000 bps still fits
        let scaled = self.0 as i128 * rate.bps() as i128;
        Money(((scaled + 5_000) / 10_000) as i64)
    }

    /// Halves an amount for the CGST/SGST split. The halves always sum to
    /// `self`; an odd paisa goes to the first half.
    ///
    /// ```rust
    /// use labbill_core::money::Money;
    ///
    /// let (cgst, sgst) = Money::from_paise(1805).split_even();
    /// assert_eq!((cgst.paise(), sgst.paise()), (903, 902));
    /// ```
    pub fn split_even(&self) -> (Money, Money) {
        let first = self.0 - self.0 / 2;
        (Money(first), Money(self.0 - first))
    }
}

/// `₹1249.50`, `-₹3.05`. Used in logs and commission summaries.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}
