//! # Tax & Total Calculator
//!
//! Derives subtotal, discount, GST and net amount from an invoice's lines.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Lines: [CBC ₹500 @ 0%] [Lipid ₹1200 @ 18%]                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  per-line GST (rounded half-up to the paisa)                           │
//! │       0.00        216.00                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total = Σ price          = ₹1700.00                                   │
//! │  tax   = Σ line GST       = ₹216.00   ──► CGST ₹108.00 + SGST ₹108.00  │
//! │  net   = total − discount + tax                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The discount is applied once to the whole invoice, never per line, and
//! GST is charged on the undiscounted line price.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Percentage;
use crate::validation::{
    validate_gst_bps, validate_item_count, validate_non_negative_paise, ValidationResult,
};

/// One billable line as seen by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxableLine {
    pub price: Money,
    pub gst: Percentage,
}

impl TaxableLine {
    pub fn new(price: Money, gst: Percentage) -> Self {
        TaxableLine { price, gst }
    }

    /// GST owed on this line.
    #[inline]
    pub fn tax(&self) -> Money {
        self.price.apply_percentage(self.gst)
    }
}

/// Totals for a whole invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub total: Money,
    pub discount: Money,
    pub tax: Money,
    pub cgst: Money,
    pub sgst: Money,
    pub net: Money,
    /// GST per line, in input order.
    pub line_taxes: Vec<Money>,
}

/// Computes invoice totals.
///
/// ## Rules
/// - At least one line
/// - Prices and discount non-negative, GST within 0–100%
/// - Discount may not exceed `total + tax`; an oversized discount is a
///   data-entry mistake and is rejected rather than clamped
///
/// ## Example
/// ```rust
/// use labbill_core::money::Money;
/// use labbill_core::tax::{calculate_totals, TaxableLine};
/// use labbill_core::types::Percentage;
///
/// let lines = [TaxableLine::new(Money::from_rupees(500), Percentage::zero())];
/// let totals = calculate_totals(&lines, Money::zero()).unwrap();
/// assert_eq!(totals.net, Money::from_rupees(500));
/// ```
pub fn calculate_totals(lines: &[TaxableLine], discount: Money) -> ValidationResult<InvoiceTotals> {
    validate_item_count(lines.len())?;
    validate_non_negative_paise("discount_amount", discount.paise())?;

    for line in lines {
        validate_non_negative_paise("price", line.price.paise())?;
        validate_gst_bps(line.gst.bps())?;
    }

    let line_taxes: Vec<Money> = lines.iter().map(TaxableLine::tax).collect();
    let total: Money = lines.iter().map(|l| l.price).sum();
    let tax: Money = line_taxes.iter().copied().sum();

    let billed = total + tax;
    if discount > billed {
        return Err(ValidationError::DiscountExceedsBill { discount, billed });
    }

    let (cgst, sgst) = tax.split_even();

    Ok(InvoiceTotals {
        total,
        discount,
        tax,
        cgst,
        sgst,
        net: total - discount + tax,
        line_taxes,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
