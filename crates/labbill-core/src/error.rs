//! # Domain Errors
//!
//! Two families, mapped onto engine error codes one level up:
//!
//! ```text
//! ValidationError ──────────────► VALIDATION   fix the input, never retry
//! CoreError::NotFound ──────────► NOT_FOUND
//! CoreError::*Exceeds* ─────────► CONSISTENCY  the state forbids it
//! ```
//!
//! Nothing in this crate clamps a value into range. An amount that would
//! break an invariant becomes an error carrying the amounts involved.

use thiserror::Error;

use crate::money::Money;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation before any business logic ran.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist for this tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A payment would exceed what is still owed on the invoice.
    ///
    /// ## User Workflow
    /// ```text
    /// Invoice net ₹1000, paid ₹700 → balance ₹300
    ///      │
    ///      ▼
    /// record_payment(₹400)
    ///      │
    ///      ▼
    /// PaymentExceedsBalance { requested: ₹400, balance: ₹300 }
    /// ```
    #[error("Payment of {requested} exceeds outstanding balance {balance}")]
    PaymentExceedsBalance { requested: Money, balance: Money },

    /// A refund would return more than has been paid and not yet refunded.
    #[error("Refund of {requested} exceeds refundable amount {refundable}")]
    RefundExceedsPaid { requested: Money, refundable: Money },

    /// An invoice edit would leave recorded payments above the new net amount.
    ///
    /// The caller must process a refund first.
    #[error("Invoice {invoice_id} already has {paid} paid, above the edited net amount {net}")]
    PaidExceedsNet {
        invoice_id: String,
        paid: Money,
        net: Money,
    },

    /// An invoice edit would leave refunds above the edited paid amount.
    #[error("Invoice {invoice_id} has {refunded} refunded, above the edited paid amount {paid}")]
    RefundExceedsEditedPaid {
        invoice_id: String,
        refunded: Money,
        paid: Money,
    },

    /// A payout would exceed the commission still owed to the doctor.
    #[error("Payout of {requested} exceeds outstanding commission {outstanding} for doctor {doctor_id}")]
    PayoutExceedsOutstanding {
        doctor_id: String,
        requested: Money,
        outstanding: Money,
    },
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True for errors that would break a money invariant.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            CoreError::PaymentExceedsBalance { .. }
                | CoreError::RefundExceedsPaid { .. }
                | CoreError::PaidExceedsNet { .. }
                | CoreError::RefundExceedsEditedPaid { .. }
                | CoreError::PayoutExceedsOutstanding { .. }
        )
    }
}

/// Problems with the request itself. Messages are shown to the operator
/// as is.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Malformed invoice id.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A catalog record exists but is switched off.
    #[error("{entity} {id} is inactive")]
    Inactive { entity: String, id: String },

    /// The invoice has no billable items.
    #[error("at least one test must be selected")]
    NoItems,

    /// Discount larger than everything billed.
    #[error("discount {discount} exceeds billed amount {billed}")]
    DiscountExceedsBill { discount: Money, billed: Money },

    /// Amount paid up front exceeds the invoice net amount.
    #[error("paid amount {paid} exceeds net amount {net}")]
    Overpayment { paid: Money, net: Money },
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
