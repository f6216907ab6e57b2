//! # Domain Types
//!
//! Core domain types used throughout the settlement engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Invoice      │   │  InvoiceItem    │   │ InvoiceTxn      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  invoice_id(FK) │   │  invoice_id(FK) │       │
//! │  │  invoice_number │   │  test_id        │   │  kind           │       │
//! │  │  net / paid     │   │  price snapshot │   │  amount         │       │
//! │  │  refund / status│   │  gst_bps        │   │  note           │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Doctor       │   │    Payout       │   │  AuditEntry     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  is_introducer  │   │  doctor_id (FK) │   │  action         │       │
//! │  │  commission_*   │   │  amount         │   │  before / after │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Patient and LabTest are registry records owned by other services;     │
//! │  invoices only reference them.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invoices, items, transactions and payouts are keyed by UUID v4; the
//! printed `invoice_number` is unique per tenant but never used as a key.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Percentage
// =============================================================================

/// A rate in basis points: 1800 is 18% GST, 1250 is 12.5% commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percentage(u32);

impl Percentage {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    pub fn from_percent(pct: f64) -> Self {
        Percentage((pct * 100.0).round() as u32)
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

    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Commission Rate
// =============================================================================

/// How a doctor's or introducer's commission is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    /// `commission_value` is basis points of the invoice net amount.
    Percentage,
    /// `commission_value` is a flat amount in paise per invoice.
    Fixed,
}

/// A commission rate with its value interpreted.
///
/// ## Storage
/// Stored as `(commission_type, commission_value)` column pairs, where the
/// value is basis points for `Percentage` and paise for `Fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CommissionRate {
    Percentage(Percentage),
    Fixed(Money),
}

impl CommissionRate {
    /// Rebuilds a rate from its stored column pair.
    pub fn from_parts(kind: CommissionType, value: i64) -> Self {
        match kind {
            CommissionType::Percentage => {
                CommissionRate::Percentage(Percentage::from_bps(value.max(0) as u32))
            }
            CommissionType::Fixed => CommissionRate::Fixed(Money::from_paise(value)),
        }
    }

    /// Splits a rate into its stored column pair.
    pub fn into_parts(self) -> (CommissionType, i64) {
        match self {
            CommissionRate::Percentage(pct) => (CommissionType::Percentage, pct.bps() as i64),
            CommissionRate::Fixed(amount) => (CommissionType::Fixed, amount.paise()),
        }
    }

    /// Commission owed on an invoice with the given net amount.
    ///
    /// Fixed commissions ignore the net amount entirely: a ₹1 invoice still
    /// earns the full fixed figure.
    pub fn commission_on(&self, net_amount: Money) -> Money {
        match self {
            CommissionRate::Percentage(pct) => net_amount.apply_percentage(*pct),
            CommissionRate::Fixed(amount) => *amount,
        }
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionRate::Percentage(pct) => write!(f, "{}", pct),
            CommissionRate::Fixed(amount) => write!(f, "fixed {}", amount),
        }
    }
}

// =============================================================================
// Commission Mode
// =============================================================================

/// Resolved attribution of referral commission for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionMode {
    /// Walk-in / self-referred: nobody earns.
    None,
    /// Referring doctor earns at the doctor's rate.
    Doctor,
    /// Introducer attribution without a referring doctor.
    Introducer,
    /// Doctor and a distinct introducer each earn at their own rate.
    Split,
}

impl Default for CommissionMode {
    fn default() -> Self {
        CommissionMode::None
    }
}

// =============================================================================
// Introducer Flag
// =============================================================================

/// Free-text introducer attribution, only meaningful when no registered
/// introducer is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum IntroducerFlag {
    #[serde(rename = "none")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "none"))]
    Unset,
    #[serde(rename = "self")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "self"))]
    SelfIntroduced,
    #[serde(rename = "doctor")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "doctor"))]
    Doctor,
}

impl Default for IntroducerFlag {
    fn default() -> Self {
        IntroducerFlag::Unset
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment state of an invoice, derived from paid/refund/net amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing paid yet.
    Pending,
    /// Some, but not all, of the net amount has been paid.
    Partial,
    /// Paid in full.
    Paid,
    /// Refunds reached the full-refund threshold.
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Payment Mode
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    BankTransfer,
    Cheque,
}

impl Default for PaymentMode {
    fn default() -> Self {
        PaymentMode::Cash
    }
}

// =============================================================================
// Registry Records
// =============================================================================

/// A registered patient (owned by the registration service).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Patient {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Unique hospital/lab identifier.
    pub uhid: String,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A billable test from the lab's catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LabTest {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Current catalog price in paise. Copied into invoice items.
    pub price_paise: i64,
    /// GST in basis points (1800 = 18%).
    pub gst_bps: u32,
    pub department: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LabTest {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }

    #[inline]
    pub fn gst(&self) -> Percentage {
        Percentage::from_bps(self.gst_bps)
    }
}

/// A referring doctor or an introducer.
///
/// Introducers are doctors flagged with `is_introducer`; both earn
/// commission through the same ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Doctor {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub is_introducer: bool,
    pub commission_type: CommissionType,
    /// Basis points for percentage commissions, paise for fixed ones.
    pub commission_value: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    #[inline]
    pub fn rate(&self) -> CommissionRate {
        CommissionRate::from_parts(self.commission_type, self.commission_value)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A lab invoice with its running payment ledger fields.
///
/// ## Invariants
/// - `net = total − discount + tax`
/// - `balance = net − paid`
/// - `0 ≤ paid ≤ net`, `0 ≤ refund ≤ paid`
/// - `cgst + sgst = tax`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub introducer_id: Option<String>,
    pub introducer_raw: IntroducerFlag,
    pub department: String,
    /// `INV/25-26/00001` - unique per tenant.
    pub invoice_number: String,
    /// `2025-26`
    pub fiscal_year: String,
    pub sequence_number: i64,
    pub total_paise: i64,
    pub discount_paise: i64,
    pub tax_paise: i64,
    pub cgst_paise: i64,
    pub sgst_paise: i64,
    pub net_paise: i64,
    pub paid_paise: i64,
    pub refund_paise: i64,
    pub balance_paise: i64,
    pub payment_mode: PaymentMode,
    pub payment_status: PaymentStatus,
    pub commission_mode: CommissionMode,
    /// Doctor rate in force when the invoice was last billed.
    pub doctor_commission_type: Option<CommissionType>,
    pub doctor_commission_value: Option<i64>,
    /// Introducer rate in force when the invoice was last billed.
    pub introducer_commission_type: Option<CommissionType>,
    pub introducer_commission_value: Option<i64>,
    pub doctor_commission_paise: i64,
    pub introducer_commission_paise: i64,
    pub refund_note: Option<String>,
    /// Bumped on every write; the write itself takes the row lock.
    pub version: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }

    #[inline]
    pub fn net(&self) -> Money {
        Money::from_paise(self.net_paise)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_paise(self.paid_paise)
    }

    #[inline]
    pub fn refunded(&self) -> Money {
        Money::from_paise(self.refund_paise)
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_paise(self.balance_paise)
    }

    /// Payments not yet given back: the most a refund may still return.
    #[inline]
    pub fn refundable(&self) -> Money {
        self.paid() - self.refunded()
    }

    pub fn doctor_rate(&self) -> Option<CommissionRate> {
        match (self.doctor_commission_type, self.doctor_commission_value) {
            (Some(kind), Some(value)) => Some(CommissionRate::from_parts(kind, value)),
            _ => None,
        }
    }

    pub fn introducer_rate(&self) -> Option<CommissionRate> {
        match (self.introducer_commission_type, self.introducer_commission_value) {
            (Some(kind), Some(value)) => Some(CommissionRate::from_parts(kind, value)),
            _ => None,
        }
    }
}

// =============================================================================
// Invoice Item
// =============================================================================

/// A billed test on an invoice.
/// Uses snapshot pattern to freeze catalog data at billing time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub test_id: String,
    /// Test name at billing time (frozen).
    pub test_name: String,
    /// Price in paise at billing time (frozen).
    pub price_paise: i64,
    /// GST rate at billing time (frozen).
    pub gst_bps: u32,
    /// GST for this line.
    pub tax_paise: i64,
    /// Sample barcode; free text.
    pub sample_id: Option<String>,
    pub position: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }
}

// =============================================================================
// Invoice Transaction
// =============================================================================

/// Kind of money movement recorded against an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Payment,
    Refund,
    /// Paid amount overwritten by an invoice edit (signed delta).
    Adjustment,
}

/// One append-only row per payment, refund or edit adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceTransaction {
    pub id: String,
    pub invoice_id: String,
    pub kind: TransactionKind,
    pub amount_paise: i64,
    pub payment_mode: Option<PaymentMode>,
    pub note: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payout
// =============================================================================

/// Commission paid out to a doctor or introducer. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payout {
    pub id: String,
    pub tenant_id: String,
    pub doctor_id: String,
    pub amount_paise: i64,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    pub payment_mode: PaymentMode,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payout {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_paise(self.amount_paise)
    }
}

// =============================================================================
// Audit Entry
// =============================================================================

/// A row in the audit log, written in the same transaction as the change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditEntry {
    pub id: String,
    pub tenant_id: String,
    /// `invoice.create`, `invoice.payment`, `payout.create`, ...
    pub action: String,
    /// `invoice`, `payout`
    pub entity_type: String,
    pub entity_id: String,
    /// JSON snapshot before the change.
    pub before_state: Option<String>,
    /// JSON snapshot after the change.
    pub after_state: Option<String>,
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_from_bps() {
        let rate = Percentage::from_bps(1250);
        assert_eq!(rate.bps(), 1250);
        assert!((rate.percent() - 12.5).abs() < 0.001);
        assert_eq!(rate.to_string(), "12.50%");
    }

    #[test]
    fn test_percentage_from_percent() {
        assert_eq!(Percentage::from_percent(18.0).bps(), 1800);
        assert_eq!(Percentage::from_percent(2.5).bps(), 250);
    }

    #[test]
    fn test_commission_rate_parts() {
        let pct = CommissionRate::from_parts(CommissionType::Percentage, 1000);
        assert_eq!(pct, CommissionRate::Percentage(Percentage::from_bps(1000)));
        assert_eq!(pct.into_parts(), (CommissionType::Percentage, 1000));

        let fixed = CommissionRate::from_parts(CommissionType::Fixed, 5000);
        assert_eq!(fixed, CommissionRate::Fixed(Money::from_rupees(50)));
        assert_eq!(fixed.into_parts(), (CommissionType::Fixed, 5000));
    }

    #[test]
    fn test_fixed_commission_ignores_net() {
        let fixed = CommissionRate::Fixed(Money::from_rupees(50));
        assert_eq!(fixed.commission_on(Money::from_rupees(1)), Money::from_rupees(50));
        assert_eq!(fixed.commission_on(Money::from_rupees(2000)), Money::from_rupees(50));
    }

    #[test]
    fn test_introducer_flag_serde_names() {
        assert_eq!(serde_json::to_string(&IntroducerFlag::SelfIntroduced).unwrap(), "\"self\"");
        assert_eq!(serde_json::to_string(&IntroducerFlag::Unset).unwrap(), "\"none\"");
        let flag: IntroducerFlag = serde_json::from_str("\"doctor\"").unwrap();
        assert_eq!(flag, IntroducerFlag::Doctor);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(CommissionMode::default(), CommissionMode::None);
        assert_eq!(IntroducerFlag::default(), IntroducerFlag::Unset);
    }
}
