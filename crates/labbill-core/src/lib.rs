//! # labbill-core: Pure Settlement Logic for LabBill
//!
//! This crate holds every pricing, commission and payment rule of the
//! invoice settlement engine as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      LabBill Settlement Engine                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Billing UI / request layer                      │   │
//! │  │    Draft ──► Live preview ──► Create ──► Payment / Refund       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ typed commands                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              labbill-engine (BillingEngine)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ labbill-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │    tax    │  │commission │  │ lifecycle │  │  ledger   │  │   │
//! │  │   │  totals   │  │ resolver  │  │  status   │  │ earned vs │  │   │
//! │  │   │ CGST/SGST │  │ DOC/INTRO │  │ payments  │  │  payouts  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                labbill-db (Database Layer)                      │   │
//! │  │        SQLite queries, migrations, sequence counters            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Invoice, Doctor, Payout, etc.)
//! - [`money`] - Money type with integer paise arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation
//! - [`tax`] - Invoice totals and GST split
//! - [`commission`] - Referral commission resolution
//! - [`fiscal`] - Fiscal years and invoice numbers
//! - [`lifecycle`] - Payment status and payment/refund/edit rules
//! - [`ledger`] - Commission earned vs. paid out
//! - [`command`] - Typed operation commands
//!
//! ## Example Usage
//!
//! ```rust
//! use labbill_core::money::Money;
//! use labbill_core::types::Percentage;
//!
//! let price = Money::from_rupees(1200);
//! let gst = price.apply_percentage(Percentage::from_bps(1800));
//! assert_eq!(gst, Money::from_rupees(216));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod command;
pub mod commission;
pub mod error;
pub mod fiscal;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tenant used by the seed data and single-lab deployments.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum tests on a single invoice.
pub const MAX_INVOICE_ITEMS: usize = 100;

/// Maximum length of refund notes, payout notes and references.
pub const MAX_NOTE_LENGTH: usize = 500;
