//! # labbill-db: Persistence for the Settlement Engine
//!
//! SQLite storage for invoices, sequences, payouts and the audit log, using
//! sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  labbill-engine (BillingEngine)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   labbill-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ InvoiceRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SequenceRepo  │    │ 001_initial  │  │   │
//! │  │   │ Transactions  │    │ PayoutRepo    │    │   _schema    │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labbill_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("labbill.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let seq = db.sequences().next_in(&mut tx, tenant_id, "2025-26").await?;
//! // ... insert the invoice with `seq` ...
//! tx.commit().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::audit::{AuditRecord, AuditRepository};
pub use repository::invoice::InvoiceRepository;
pub use repository::payout::PayoutRepository;
pub use repository::registry::RegistryRepository;
pub use repository::sequence::SequenceRepository;
