//! # labbill-engine: Invoice & Commission Settlement Engine
//!
//! Turns selected lab tests into priced, numbered invoices, resolves
//! referral commission, tracks payments and refunds, and settles
//! commission with doctors and introducers.
//!
//! ## Crate Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  caller (HTTP handler, desktop command, job)                           │
//! │       │  RequestContext + typed command                                │
//! │       ▼                                                                 │
//! │  labbill-engine (THIS CRATE)                                           │
//! │  ├── BillingEngine      operation flow, transactions, timeouts         │
//! │  ├── EngineConfig       defaults → TOML → LABBILL_* env                │
//! │  ├── EngineError        VALIDATION / NOT_FOUND / CONFLICT / ...        │
//! │  └── telemetry          tracing subscriber                             │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  labbill-core (pure rules)          labbill-db (SQLite)                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use labbill_engine::{BillingEngine, EngineConfig, RequestContext};
//!
//! labbill_engine::telemetry::init_tracing();
//! let engine = BillingEngine::connect(EngineConfig::load(None)?).await?;
//!
//! let ctx = RequestContext::new(tenant_id, "main", user_id);
//! let invoice = engine.create_invoice(&ctx, command).await?;
//! let invoice = engine.record_payment(&ctx, &invoice.id, payment).await?;
//! let ledger = engine.get_outstanding(&ctx, "DR-RAO").await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod telemetry;

pub use config::{ConfigError, EngineConfig};
pub use engine::{BillingEngine, RequestContext};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use invoice::{InvoiceDetail, InvoicePreview, PreviewLine};
