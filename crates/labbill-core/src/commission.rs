//! # Commission Resolver
//!
//! Decides who earns referral commission on an invoice and how much.
//!
//! ## Resolution Order (first match wins)
//! ```text
//! ┌──────────────────────────┬────────────────────────────┬──────────────┐
//! │ Referring doctor         │ Introducer                 │ Mode         │
//! ├──────────────────────────┼────────────────────────────┼──────────────┤
//! │ absent / SELF            │ none / raw SELF            │ NONE         │
//! │ present                  │ registered, different id   │ SPLIT        │
//! │ present                  │ raw flag or same id        │ DOCTOR       │
//! │ absent / SELF            │ raw DOCTOR                 │ INTRODUCER ₹0│
//! │ absent / SELF            │ registered                 │ INTRODUCER   │
//! └──────────────────────────┴────────────────────────────┴──────────────┘
//! ```
//!
//! The resolver is pure: the billing UI calls it on every keystroke of a
//! draft, and the ledger calls [`CommissionSnapshot::amounts`] to recompute
//! earnings from an invoice's current net amount.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CommissionMode, CommissionRate, Doctor, IntroducerFlag, Invoice, Percentage};

// =============================================================================
// Inputs
// =============================================================================

/// A doctor or introducer as the resolver sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReferralParty {
    pub id: String,
    pub name: String,
    pub rate: CommissionRate,
}

impl From<&Doctor> for ReferralParty {
    fn from(doctor: &Doctor) -> Self {
        ReferralParty {
            id: doctor.id.clone(),
            name: doctor.name.clone(),
            rate: doctor.rate(),
        }
    }
}

/// How the introducer was recorded on the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntroducerAttribution {
    /// A registered introducer (a `Doctor` with `is_introducer`).
    Registered(ReferralParty),
    /// Free-text flag only; never earns on its own.
    Raw(IntroducerFlag),
}

impl Default for IntroducerAttribution {
    fn default() -> Self {
        IntroducerAttribution::Raw(IntroducerFlag::Unset)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// The mode and the rates that produced an invoice's commission.
///
/// Stored on the invoice so that later edits to the doctor registry do not
/// rewrite commission already earned, while edits to the invoice's own net
/// amount do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionSnapshot {
    pub mode: CommissionMode,
    pub doctor_rate: Option<CommissionRate>,
    pub introducer_rate: Option<CommissionRate>,
}

impl CommissionSnapshot {
    /// Reads the snapshot stored on an invoice.
    pub fn of(invoice: &Invoice) -> Self {
        CommissionSnapshot {
            mode: invoice.commission_mode,
            doctor_rate: invoice.doctor_rate(),
            introducer_rate: invoice.introducer_rate(),
        }
    }

    /// Doctor and introducer commission on the given net amount.
    pub fn amounts(&self, net_amount: Money) -> (Money, Money) {
        let earn = |rate: Option<CommissionRate>| {
            rate.map(|r| r.commission_on(net_amount)).unwrap_or_default()
        };

        match self.mode {
            CommissionMode::None => (Money::zero(), Money::zero()),
            CommissionMode::Doctor => (earn(self.doctor_rate), Money::zero()),
            CommissionMode::Introducer => (Money::zero(), earn(self.introducer_rate)),
            CommissionMode::Split => (earn(self.doctor_rate), earn(self.introducer_rate)),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Result of resolving commission for one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionBreakdown {
    pub mode: CommissionMode,
    pub doctor_commission: Money,
    pub introducer_commission: Money,
    /// Percentage rate of the party driving the primary payout. `None` for
    /// fixed rates and for `NONE` mode.
    pub commission_pct: Option<Percentage>,
    pub summary: String,
    pub snapshot: CommissionSnapshot,
}

impl CommissionBreakdown {
    pub fn total(&self) -> Money {
        self.doctor_commission + self.introducer_commission
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves commission mode and amounts for an invoice.
///
/// ## Example
/// ```rust
/// use labbill_core::commission::{resolve, IntroducerAttribution, ReferralParty};
/// use labbill_core::money::Money;
/// use labbill_core::types::{CommissionMode, CommissionRate, Percentage};
///
/// let doctor = ReferralParty {
///     id: "d-1".into(),
///     name: "Dr. Rao".into(),
///     rate: CommissionRate::Percentage(Percentage::from_bps(1000)),
/// };
/// let result = resolve(Some(&doctor), &IntroducerAttribution::default(), Money::from_rupees(1000));
/// assert_eq!(result.mode, CommissionMode::Doctor);
/// assert_eq!(result.doctor_commission, Money::from_rupees(100));
/// ```
pub fn resolve(
    doctor: Option<&ReferralParty>,
    introducer: &IntroducerAttribution,
    net_amount: Money,
) -> CommissionBreakdown {
    let (snapshot, primary) = match (doctor, introducer) {
        (None, IntroducerAttribution::Raw(IntroducerFlag::Doctor)) => (
            CommissionSnapshot {
                mode: CommissionMode::Introducer,
                ..Default::default()
            },
            None,
        ),
        (None, IntroducerAttribution::Raw(_)) => (CommissionSnapshot::default(), None),
        (None, IntroducerAttribution::Registered(intro)) => (
            CommissionSnapshot {
                mode: CommissionMode::Introducer,
                doctor_rate: None,
                introducer_rate: Some(intro.rate),
            },
            Some(intro.rate),
        ),
        (Some(doc), IntroducerAttribution::Registered(intro)) if intro.id != doc.id => (
            CommissionSnapshot {
                mode: CommissionMode::Split,
                doctor_rate: Some(doc.rate),
                introducer_rate: Some(intro.rate),
            },
            Some(doc.rate),
        ),
        (Some(doc), _) => (
            CommissionSnapshot {
                mode: CommissionMode::Doctor,
                doctor_rate: Some(doc.rate),
                introducer_rate: None,
            },
            Some(doc.rate),
        ),
    };

    let (doctor_commission, introducer_commission) = snapshot.amounts(net_amount);
    let commission_pct = match primary {
        Some(CommissionRate::Percentage(pct)) => Some(pct),
        _ => None,
    };

    let summary = summarize(
        &snapshot,
        doctor,
        introducer,
        doctor_commission,
        introducer_commission,
    );

    CommissionBreakdown {
        mode: snapshot.mode,
        doctor_commission,
        introducer_commission,
        commission_pct,
        summary,
        snapshot,
    }
}

fn summarize(
    snapshot: &CommissionSnapshot,
    doctor: Option<&ReferralParty>,
    introducer: &IntroducerAttribution,
    doctor_commission: Money,
    introducer_commission: Money,
) -> String {
    let registered = match introducer {
        IntroducerAttribution::Registered(party) => Some(party),
        IntroducerAttribution::Raw(_) => None,
    };

    match (snapshot.mode, doctor, registered) {
        (CommissionMode::Doctor, Some(doc), _) => {
            format!("Doctor {} earns {} ({})", doc.name, doctor_commission, doc.rate)
        }
        (CommissionMode::Split, Some(doc), Some(intro)) => format!(
            "Split: doctor {} earns {} ({}), introducer {} earns {} ({})",
            doc.name, doctor_commission, doc.rate, intro.name, introducer_commission, intro.rate
        ),
        (CommissionMode::Introducer, _, Some(intro)) => format!(
            "Introducer {} earns {} ({})",
            intro.name, introducer_commission, intro.rate
        ),
        (CommissionMode::Introducer, _, None) => {
            "Introduced by an unregistered doctor: no commission".to_string()
        }
        _ => "Self-referred: no commission".to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
