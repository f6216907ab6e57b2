//! # Invoice Lifecycle Rules
//!
//! Payment status derivation and the bounds every payment, refund and edit
//! must respect.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌─────────┐  payment  ┌─────────┐  payment  ┌────────┐               │
//! │   │ PENDING │──────────►│ PARTIAL │──────────►│  PAID  │               │
//! │   └─────────┘           └─────────┘           └────────┘               │
//! │                              │                    │                     │
//! │                              │ refund ≥ threshold │                     │
//! │                              ▼                    │                     │
//! │                        ┌──────────┐               │                     │
//! │                        │ REFUNDED │◄──────────────┘                     │
//! │                        └──────────┘                                     │
//! │                                                                         │
//! │   Partial refunds keep the payment-derived status.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status is never stored independently of the amounts: every write
//! recomputes it from `(net, paid, refunded)`.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Invoice, PaymentStatus, Percentage};
use crate::validation::{validate_non_negative_paise, validate_positive_paise};

// =============================================================================
// Refund Policy
// =============================================================================

/// Share of the paid amount that must be refunded before an invoice counts
/// as REFUNDED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    pub full_refund_threshold: Percentage,
}

impl RefundPolicy {
    pub const fn new(full_refund_threshold: Percentage) -> Self {
        RefundPolicy {
            full_refund_threshold,
        }
    }

    /// True when `refunded` reaches the threshold share of `paid`.
    pub fn is_full_refund(&self, paid: Money, refunded: Money) -> bool {
        if !paid.is_positive() {
            return false;
        }
        let threshold = self.full_refund_threshold.bps() as i128;
        refunded.paise() as i128 * 10_000 >= paid.paise() as i128 * threshold
    }
}

impl Default for RefundPolicy {
    fn default() -> Self {
        RefundPolicy::new(Percentage::from_bps(10_000))
    }
}

// =============================================================================
// Payment State
// =============================================================================

/// The three amounts that drive an invoice's payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentState {
    pub net: Money,
    pub paid: Money,
    pub refunded: Money,
}

impl PaymentState {
    /// Initial state of a new invoice.
    ///
    /// ## Rules
    /// - `0 ≤ paid ≤ net`
    pub fn opening(net: Money, paid: Money) -> CoreResult<Self> {
        validate_non_negative_paise("paid_amount", paid.paise())?;
        if paid > net {
            return Err(ValidationError::Overpayment { paid, net }.into());
        }

        Ok(PaymentState {
            net,
            paid,
            refunded: Money::zero(),
        })
    }

    pub fn of(invoice: &Invoice) -> Self {
        PaymentState {
            net: invoice.net(),
            paid: invoice.paid(),
            refunded: invoice.refunded(),
        }
    }

    /// `net − paid`
    #[inline]
    pub fn balance(&self) -> Money {
        self.net - self.paid
    }

    /// `paid − refunded`
    #[inline]
    pub fn refundable(&self) -> Money {
        self.paid - self.refunded
    }

    /// Derives the payment status.
    ///
    /// Evaluated in order: REFUNDED, PAID, PENDING, PARTIAL. A zero-net
    /// invoice with nothing paid is PAID.
    pub fn status(&self, policy: &RefundPolicy) -> PaymentStatus {
        if policy.is_full_refund(self.paid, self.refunded) {
            PaymentStatus::Refunded
        } else if self.paid >= self.net {
            PaymentStatus::Paid
        } else if self.paid.is_zero() {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Partial
        }
    }

    /// Applies an incremental payment.
    ///
    /// ## Rules
    /// - Amount must not be negative (validation)
    /// - Amount must not exceed the balance (consistency)
    pub fn apply_payment(&self, amount: Money) -> CoreResult<Self> {
        validate_non_negative_paise("paid_amount", amount.paise())?;

        let balance = self.balance();
        if amount > balance {
            return Err(CoreError::PaymentExceedsBalance {
                requested: amount,
                balance,
            });
        }

        Ok(PaymentState {
            paid: self.paid + amount,
            ..*self
        })
    }

    /// Applies a refund. `paid` never decreases.
    ///
    /// ## Rules
    /// - Amount must be positive (validation)
    /// - Amount must not exceed `paid − refunded` (consistency)
    pub fn apply_refund(&self, amount: Money) -> CoreResult<Self> {
        validate_positive_paise("refund_amount", amount.paise())?;

        let refundable = self.refundable();
        if amount > refundable {
            return Err(CoreError::RefundExceedsPaid {
                requested: amount,
                refundable,
            });
        }

        Ok(PaymentState {
            refunded: self.refunded + amount,
            ..*self
        })
    }

    /// Re-prices an invoice after its items were replaced.
    ///
    /// ## Rules
    /// - Previously recorded `paid` above the new net is rejected outright;
    ///   the caller must refund first
    /// - `paid_override`, when given, replaces `paid` and must satisfy
    ///   `0 ≤ paid ≤ new net`
    /// - Refunds may not exceed the resulting `paid`
    pub fn reprice(
        &self,
        invoice_id: &str,
        new_net: Money,
        paid_override: Option<Money>,
    ) -> CoreResult<Self> {
        if self.paid > new_net {
            return Err(CoreError::PaidExceedsNet {
                invoice_id: invoice_id.to_string(),
                paid: self.paid,
                net: new_net,
            });
        }

        let paid = match paid_override {
            Some(paid) => {
                validate_non_negative_paise("paid_amount", paid.paise())?;
                if paid > new_net {
                    return Err(ValidationError::Overpayment { paid, net: new_net }.into());
                }
                paid
            }
            None => self.paid,
        };

        if self.refunded > paid {
            return Err(CoreError::RefundExceedsEditedPaid {
                invoice_id: invoice_id.to_string(),
                refunded: self.refunded,
                paid,
            });
        }

        Ok(PaymentState {
            net: new_net,
            paid,
            refunded: self.refunded,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
