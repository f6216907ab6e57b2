//! # Audit Repository
//!
//! Append-only before/after snapshots of every billing mutation.
//!
//! ## Same-Transaction Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. UPDATE invoices SET paid_paise = ? ...                             │
//! │  2. INSERT INTO invoice_transactions (...)                             │
//! │  3. INSERT INTO audit_log (action, before_state, after_state)          │
//! │                                                                         │
//! │  COMMIT ← the entry exists iff the mutation does                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use labbill_core::AuditEntry;

/// One mutation to record. States are JSON snapshots.
#[derive(Debug, Clone, Copy)]
pub struct AuditRecord<'a> {
    pub tenant_id: &'a str,
    /// e.g. "invoice.create", "invoice.refund", "payout.create"
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub before_state: Option<&'a str>,
    pub after_state: Option<&'a str>,
    pub actor: &'a str,
}

/// Repository for the audit log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Appends an entry inside the caller's transaction.
    pub async fn record_in(&self, conn: &mut SqliteConnection, record: AuditRecord<'_>) -> DbResult<AuditEntry> {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: record.tenant_id.to_string(),
            action: record.action.to_string(),
            entity_type: record.entity_type.to_string(),
            entity_id: record.entity_id.to_string(),
            before_state: record.before_state.map(str::to_string),
            after_state: record.after_state.map(str::to_string),
            actor: record.actor.to_string(),
            created_at: Utc::now(),
        };

        debug!(
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "Recording audit entry"
        );

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, tenant_id, action, entity_type, entity_id,
                before_state, after_state, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.before_state)
        .bind(&entry.after_state)
        .bind(&entry.actor)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// History of one entity, oldest first.
    pub async fn for_entity(&self, tenant_id: &str, entity_type: &str, entity_id: &str) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, tenant_id, action, entity_type, entity_id,
                   before_state, after_state, actor, created_at
            FROM audit_log
            WHERE tenant_id = ?1 AND entity_type = ?2 AND entity_id = ?3
            ORDER BY created_at, rowid
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
