//! # Repository Module
//!
//! Database repository implementations for the settlement engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  BillingEngine                                                         │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       │  db.invoices().lock_in(&mut tx, tenant, id).await?;            │
//! │       ▼                                                                 │
//! │  Repositories                                                          │
//! │  ├── SequenceRepository   next_in / next / current                     │
//! │  ├── InvoiceRepository    insert_in / replace_in / update_payment_in   │
//! │  ├── RegistryRepository   patients, tests, doctors                     │
//! │  ├── PayoutRepository     insert_in / for_doctor                       │
//! │  └── AuditRepository      record_in / for_entity                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Methods ending in `_in` run on the caller's transaction; the rest use the
//! pool directly.

pub mod audit;
pub mod invoice;
pub mod payout;
pub mod registry;
pub mod sequence;
