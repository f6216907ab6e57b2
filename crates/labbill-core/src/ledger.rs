//! # Commission Ledger
//!
//! Earned commission is never stored as a running total. It is re-summed
//! from the invoices every time the ledger is read, using each invoice's
//! current net amount and its rate snapshot, so edits and refunds flow
//! through automatically.
//!
//! ```text
//! invoices (doctor_id = D) ──► doctor side ─────┐
//!                                               ├──► total_earned ─┐
//! invoices (introducer_id = D) ──► intro side ──┘                  ├──► outstanding
//! payouts (doctor_id = D) ─────────────────────────► total_paid ───┘
//! ```
//!
//! Cost is O(invoices) per query; a materialized total invalidated on
//! invoice writes is the scaling path if that ever matters.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::commission::CommissionSnapshot;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Invoice, PaymentStatus, Payout};
use crate::validation::validate_positive_paise;

/// Commission earned by one doctor or introducer against payouts made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionLedger {
    pub doctor_id: String,
    pub total_earned: Money,
    pub total_paid: Money,
    pub outstanding: Money,
}

impl CommissionLedger {
    /// Builds the ledger from the party's invoices and payouts.
    ///
    /// Invoices that reference the party on neither side contribute nothing,
    /// so callers may pass a superset.
    pub fn compute(doctor_id: &str, invoices: &[Invoice], payouts: &[Payout]) -> Self {
        let total_earned: Money = invoices
            .iter()
            .map(|invoice| earned_on(invoice, doctor_id))
            .sum();
        let total_paid: Money = payouts
            .iter()
            .filter(|p| p.doctor_id == doctor_id)
            .map(Payout::amount)
            .sum();

        CommissionLedger {
            doctor_id: doctor_id.to_string(),
            total_earned,
            total_paid,
            outstanding: total_earned - total_paid,
        }
    }

    /// Checks that a payout fits within what is still owed.
    pub fn check_payout(&self, amount: Money) -> CoreResult<()> {
        validate_positive_paise("amount", amount.paise())?;

        if amount > self.outstanding {
            return Err(CoreError::PayoutExceedsOutstanding {
                doctor_id: self.doctor_id.clone(),
                requested: amount,
                outstanding: self.outstanding,
            });
        }

        Ok(())
    }
}

/// Commission a party earns on one invoice, from its current state.
///
/// REFUNDED invoices earn nothing. A party referenced as both doctor and
/// introducer earns only the doctor side, since the resolver never splits
/// between the same party.
pub fn earned_on(invoice: &Invoice, doctor_id: &str) -> Money {
    if invoice.payment_status == PaymentStatus::Refunded {
        return Money::zero();
    }

    let (doctor_side, introducer_side) = CommissionSnapshot::of(invoice).amounts(invoice.net());
    let mut earned = Money::zero();

    if invoice.doctor_id.as_deref() == Some(doctor_id) {
        earned += doctor_side;
    }
    if invoice.introducer_id.as_deref() == Some(doctor_id) {
        earned += introducer_side;
    }

    earned
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommissionMode, CommissionType, IntroducerFlag, PaymentMode};
    use chrono::{NaiveDate, Utc};

    fn invoice(net_rupees: i64, doctor: Option<&str>, introducer: Option<&str>) -> Invoice {
        let now = Utc::now();
        let net = net_rupees * 100;
        Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: "t".to_string(),
            branch_id: "b".to_string(),
            patient_id: "p".to_string(),
            doctor_id: doctor.map(String::from),
            introducer_id: introducer.map(String::from),
            introducer_raw: IntroducerFlag::Unset,
            department: "Pathology".to_string(),
            invoice_number: "INV/25-26/00001".to_string(),
            fiscal_year: "2025-26".to_string(),
            sequence_number: 1,
            total_paise: net,
            discount_paise: 0,
            tax_paise: 0,
            cgst_paise: 0,
            sgst_paise: 0,
            net_paise: net,
            paid_paise: 0,
            refund_paise: 0,
            balance_paise: net,
            payment_mode: PaymentMode::Cash,
            payment_status: PaymentStatus::Pending,
            commission_mode: match (doctor, introducer) {
                (Some(_), Some(_)) => CommissionMode::Split,
                (Some(_), None) => CommissionMode::Doctor,
                (None, Some(_)) => CommissionMode::Introducer,
                (None, None) => CommissionMode::None,
            },
            doctor_commission_type: doctor.map(|_| CommissionType::Percentage),
            doctor_commission_value: doctor.map(|_| 1000),
            introducer_commission_type: introducer.map(|_| CommissionType::Fixed),
            introducer_commission_value: introducer.map(|_| 5000),
            doctor_commission_paise: 0,
            introducer_commission_paise: 0,
            refund_note: None,
            version: 1,
            created_by: "u".to_string(),
            created_at: now,
            updated_by: None,
            updated_at: now,
        }
    }

    fn payout(doctor_id: &str, rupees: i64) -> Payout {
        Payout {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: "t".to_string(),
            doctor_id: doctor_id.to_string(),
            amount_paise: rupees * 100,
            payment_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            payment_mode: PaymentMode::BankTransfer,
            reference_number: None,
            notes: None,
            created_by: "u".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_earned_across_both_sides() {
        let invoices = vec![
            invoice(1000, Some("rao"), None),          // 10% = 100
            invoice(2000, Some("mehta"), Some("rao")), // rao introduces: fixed 50
            invoice(500, Some("other"), None),         // not rao
        ];
        let ledger = CommissionLedger::compute("rao", &invoices, &[payout("rao", 30)]);

        assert_eq!(ledger.total_earned, Money::from_rupees(150));
        assert_eq!(ledger.total_paid, Money::from_rupees(30));
        assert_eq!(ledger.outstanding, Money::from_rupees(120));
    }

    #[test]
    fn test_refunded_invoice_earns_nothing() {
        let mut refunded = invoice(1000, Some("rao"), None);
        refunded.payment_status = PaymentStatus::Refunded;
        assert!(earned_on(&refunded, "rao").is_zero());
    }

    #[test]
    fn test_recomputed_from_current_net() {
        let mut edited = invoice(1000, Some("rao"), None);
        edited.net_paise = 150_000;
        assert_eq!(earned_on(&edited, "rao"), Money::from_rupees(150));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let invoices = vec![invoice(1234, Some("rao"), Some("mehta"))];
        let payouts = vec![payout("rao", 10)];
        assert_eq!(
            CommissionLedger::compute("rao", &invoices, &payouts),
            CommissionLedger::compute("rao", &invoices, &payouts)
        );
    }

    #[test]
    fn test_payout_checks() {
        let ledger = CommissionLedger::compute("rao", &[invoice(1000, Some("rao"), None)], &[]);

        assert!(ledger.check_payout(Money::from_rupees(100)).is_ok());
        assert!(matches!(
            ledger.check_payout(Money::from_rupees(101)),
            Err(CoreError::PayoutExceedsOutstanding { .. })
        ));
        assert!(matches!(
            ledger.check_payout(Money::zero()),
            Err(CoreError::Validation(_))
        ));
    }
}
