//! # Typed Commands
//!
//! One request type per engine operation. Each carries a `validate()` that
//! runs the field-level rules before any lookup or transaction.
//!
//! ```text
//! Billing UI ──JSON──► serde ──► XxxCommand ──validate()──► BillingEngine
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{IntroducerFlag, PaymentMode};
use crate::validation::{
    validate_item_count, validate_non_negative_paise, validate_optional_text,
    validate_positive_paise, validate_required_id, validate_required_note, ValidationResult,
};
use crate::MAX_NOTE_LENGTH;

/// Doctor selection sentinel for self-referred patients.
pub const SELF_REFERRAL: &str = "SELF";

const MAX_SAMPLE_ID_LENGTH: usize = 64;
const MAX_DEPARTMENT_LENGTH: usize = 100;
const MAX_REFERENCE_LENGTH: usize = 100;

// =============================================================================
// Invoice Draft
// =============================================================================

/// A selected test. Prices always come from the catalog, never the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DraftLineItem {
    pub test_id: String,
    /// Sample barcode.
    #[serde(default)]
    pub sample_id: Option<String>,
}

impl DraftLineItem {
    pub fn new(test_id: impl Into<String>) -> Self {
        DraftLineItem {
            test_id: test_id.into(),
            sample_id: None,
        }
    }
}

/// Everything the operator fills in on the billing screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDraft {
    pub patient_id: String,
    /// Registered doctor id, or `SELF` / absent for self-referred.
    #[serde(default)]
    pub doctor_id: Option<String>,
    /// Registered introducer id. Takes precedence over `introducer_raw`.
    #[serde(default)]
    pub introducer_id: Option<String>,
    #[serde(default)]
    pub introducer_raw: IntroducerFlag,
    /// Defaults to the first test's department.
    #[serde(default)]
    pub department: Option<String>,
    pub items: Vec<DraftLineItem>,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub payment_mode: PaymentMode,
}

impl InvoiceDraft {
    /// Referring doctor id, with `SELF` and blanks treated as absent.
    pub fn referring_doctor_id(&self) -> Option<&str> {
        self.doctor_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case(SELF_REFERRAL))
    }

    /// Registered introducer id, with blanks treated as absent.
    pub fn registered_introducer_id(&self) -> Option<&str> {
        self.introducer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_required_id("patient_id", &self.patient_id)?;
        validate_item_count(self.items.len())?;

        for item in &self.items {
            validate_required_id("test_id", &item.test_id)?;
            validate_optional_text("sample_id", item.sample_id.as_deref(), MAX_SAMPLE_ID_LENGTH)?;
        }

        if let Some(id) = self.referring_doctor_id() {
            validate_required_id("doctor_id", id)?;
        }
        if let Some(id) = self.registered_introducer_id() {
            validate_required_id("introducer_id", id)?;
        }

        validate_optional_text("department", self.department.as_deref(), MAX_DEPARTMENT_LENGTH)?;
        validate_non_negative_paise("discount_amount", self.discount_amount.paise())
    }
}

// =============================================================================
// Invoice Commands
// =============================================================================

/// `createInvoice`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateInvoiceCommand {
    #[serde(flatten)]
    #[ts(flatten)]
    pub draft: InvoiceDraft,
    /// Collected at the counter when the invoice is created.
    #[serde(default)]
    pub paid_amount: Money,
}

impl CreateInvoiceCommand {
    pub fn validate(&self) -> ValidationResult<()> {
        self.draft.validate()?;
        validate_non_negative_paise("paid_amount", self.paid_amount.paise())
    }
}

/// `updateInvoice`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateInvoiceCommand {
    #[serde(flatten)]
    #[ts(flatten)]
    pub draft: InvoiceDraft,
    /// Replaces the recorded paid amount when present. Absent keeps it.
    #[serde(default)]
    pub paid_amount: Option<Money>,
}

impl UpdateInvoiceCommand {
    pub fn validate(&self) -> ValidationResult<()> {
        self.draft.validate()?;
        if let Some(paid) = self.paid_amount {
            validate_non_negative_paise("paid_amount", paid.paise())?;
        }
        Ok(())
    }
}

/// `recordPayment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordPaymentCommand {
    pub paid_amount: Money,
    #[serde(default)]
    pub payment_mode: PaymentMode,
}

impl RecordPaymentCommand {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_non_negative_paise("paid_amount", self.paid_amount.paise())
    }
}

/// `processRefund`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProcessRefundCommand {
    pub refund_amount: Money,
    pub refund_note: String,
}

impl ProcessRefundCommand {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_positive_paise("refund_amount", self.refund_amount.paise())?;
        validate_required_note("refund_note", &self.refund_note)
    }
}

// =============================================================================
// Ledger Commands
// =============================================================================

/// `recordPayout`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordPayoutCommand {
    pub amount: Money,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RecordPayoutCommand {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_positive_paise("amount", self.amount.paise())?;
        validate_optional_text(
            "reference_number",
            self.reference_number.as_deref(),
            MAX_REFERENCE_LENGTH,
        )?;
        validate_optional_text("notes", self.notes.as_deref(), MAX_NOTE_LENGTH)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn draft() -> InvoiceDraft {
        InvoiceDraft {
            patient_id: "p-1".to_string(),
            doctor_id: None,
            introducer_id: None,
            introducer_raw: IntroducerFlag::Unset,
            department: None,
            items: vec![DraftLineItem::new("cbc")],
            discount_amount: Money::zero(),
            payment_mode: PaymentMode::Cash,
        }
    }

    #[test]
    fn test_self_sentinel_means_no_doctor() {
        let mut d = draft();
        d.doctor_id = Some("SELF".to_string());
        assert_eq!(d.referring_doctor_id(), None);

        d.doctor_id = Some("  ".to_string());
        assert_eq!(d.referring_doctor_id(), None);

        d.doctor_id = Some("doc-7".to_string());
        assert_eq!(d.referring_doctor_id(), Some("doc-7"));
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft().validate().is_ok());

        let mut empty = draft();
        empty.items.clear();
        assert!(matches!(empty.validate(), Err(ValidationError::NoItems)));

        let mut no_patient = draft();
        no_patient.patient_id = String::new();
        assert!(no_patient.validate().is_err());

        let mut negative = draft();
        negative.discount_amount = Money::from_paise(-1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_refund_requires_note() {
        let cmd = ProcessRefundCommand {
            refund_amount: Money::from_rupees(100),
            refund_note: " ".to_string(),
        };
        assert!(cmd.validate().is_err());

        let cmd = ProcessRefundCommand {
            refund_amount: Money::zero(),
            refund_note: "duplicate billing".to_string(),
        };
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_payment_amount_may_be_zero() {
        let cmd = RecordPaymentCommand {
            paid_amount: Money::zero(),
            payment_mode: PaymentMode::Upi,
        };
        assert!(cmd.validate().is_ok());

        let cmd = RecordPaymentCommand {
            paid_amount: Money::from_paise(-1),
            payment_mode: PaymentMode::Upi,
        };
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_create_command_from_json() {
        let json = r#"{
            "patient_id": "p-1",
            "doctor_id": "SELF",
            "items": [{"test_id": "cbc", "sample_id": "S-001"}],
            "discount_amount": 1000,
            "paid_amount": 50000
        }"#;
        let cmd: CreateInvoiceCommand = serde_json::from_str(json).unwrap();

        assert_eq!(cmd.draft.referring_doctor_id(), None);
        assert_eq!(cmd.draft.introducer_raw, IntroducerFlag::Unset);
        assert_eq!(cmd.paid_amount, Money::from_rupees(500));
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_payout_validation() {
        let cmd = RecordPayoutCommand {
            amount: Money::from_rupees(100),
            payment_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            payment_mode: PaymentMode::BankTransfer,
            reference_number: Some("UTR123".to_string()),
            notes: None,
        };
        assert!(cmd.validate().is_ok());

        let zero = RecordPayoutCommand {
            amount: Money::zero(),
            ..cmd
        };
        assert!(zero.validate().is_err());
    }
}
