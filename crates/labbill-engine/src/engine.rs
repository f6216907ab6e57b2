//! # Billing Engine
//!
//! Entry point for every settlement operation.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  command.validate()               reject bad input before any I/O      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  registry lookups                 catalog prices, party rates          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    first write takes the lock     sequence bump / version bump         │
//! │    read state under the lock                                           │
//! │    labbill-core decides           totals, commission, payment state    │
//! │    write rows + transaction + audit                                    │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  all of it bounded by operation_timeout → CONFLICT on expiry           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error before COMMIT drops the transaction, which rolls it back.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use labbill_core::lifecycle::RefundPolicy;
use labbill_core::validation::validate_required_id;
use labbill_core::DEFAULT_TENANT_ID;
use labbill_db::{AuditRecord, Database};

use crate::config::{ConfigError, EngineConfig};
use crate::error::{EngineError, EngineResult};

/// Who is acting, and for which tenant and branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: String,
    pub branch_id: String,
    /// Recorded as `created_by` / `updated_by` and as the audit actor.
    pub user_id: String,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>, branch_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        RequestContext {
            tenant_id: tenant_id.into(),
            branch_id: branch_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Single-tenant deployments.
    pub fn default_tenant(branch_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        RequestContext::new(DEFAULT_TENANT_ID, branch_id, user_id)
    }

    pub(crate) fn validate(&self) -> EngineResult<()> {
        validate_required_id("tenant_id", &self.tenant_id)?;
        validate_required_id("branch_id", &self.branch_id)?;
        validate_required_id("user_id", &self.user_id)?;
        Ok(())
    }
}

/// Invoice lifecycle, commission preview and commission ledger operations.
///
/// Cheap to clone; clones share the connection pool.
///
/// ```rust,ignore
/// let engine = BillingEngine::connect(EngineConfig::load(None)?).await?;
/// let ctx = RequestContext::new(tenant_id, "main", user_id);
/// let invoice = engine.create_invoice(&ctx, command).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BillingEngine {
    pub(crate) db: Database,
    pub(crate) refund_policy: RefundPolicy,
    pub(crate) business_offset: FixedOffset,
    pub(crate) invoice_prefix: String,
    operation_timeout: Duration,
}

impl BillingEngine {
    /// Opens the database described by `config` and builds the engine.
    pub async fn connect(config: EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(config_error)?;
        let db = Database::new(config.to_db_config()).await?;
        BillingEngine::new(db, &config)
    }

    /// Builds the engine on an existing database handle.
    pub fn new(db: Database, config: &EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(config_error)?;
        let business_offset = config.business_offset().map_err(config_error)?;

        info!(
            prefix = %config.invoice_prefix,
            utc_offset_minutes = config.utc_offset_minutes,
            full_refund_threshold_bps = config.full_refund_threshold_bps,
            "Billing engine ready"
        );

        Ok(BillingEngine {
            db,
            refund_policy: config.refund_policy(),
            business_offset,
            invoice_prefix: config.invoice_prefix.trim().to_string(),
            operation_timeout: config.operation_timeout(),
        })
    }

    /// Underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs one operation under the operation timeout.
    ///
    /// Expiry drops the operation's future, and with it any open
    /// transaction.
    pub(crate) async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(operation, code = ?err.code, error = %err.message, "Operation rejected");
                Err(err)
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "Operation timed out"
                );
                Err(EngineError::conflict(format!("{} timed out, please retry", operation)))
            }
        }
    }

    /// Appends an audit entry inside the operation's transaction.
    pub(crate) async fn audit_in<T: Serialize>(
        &self,
        conn: &mut SqliteConnection,
        ctx: &RequestContext,
        action: &str,
        entity: (&str, &str),
        before: Option<&T>,
        after: Option<&T>,
    ) -> EngineResult<()> {
        let before = before.map(serde_json::to_string).transpose()?;
        let after = after.map(serde_json::to_string).transpose()?;
        let (entity_type, entity_id) = entity;

        self.db
            .audit()
            .record_in(
                conn,
                AuditRecord {
                    tenant_id: &ctx.tenant_id,
                    action,
                    entity_type,
                    entity_id,
                    before_state: before.as_deref(),
                    after_state: after.as_deref(),
                    actor: &ctx.user_id,
                },
            )
            .await?;

        Ok(())
    }
}

fn config_error(err: ConfigError) -> EngineError {
    EngineError::validation(err.to_string())
}
