//! # Sequence Repository
//!
//! Per (tenant, fiscal year) invoice counters.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    INSERT INTO invoice_sequences (tenant, fy, 1)                        │
//! │      ON CONFLICT DO UPDATE SET last_value = last_value + 1              │
//! │      RETURNING last_value            ◄── takes the write lock           │
//! │    INSERT INTO invoices (... sequence_number = last_value ...)          │
//! │  COMMIT                              ◄── number becomes visible         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent creators queue on the write lock, so no two transactions can
//! read the same `last_value`. A rolled-back creation rolls back its bump
//! too; gaps only appear if a caller discards an allocated number itself.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for invoice number counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates the next number inside the caller's transaction.
    ///
    /// Must be the first write of the transaction that inserts the invoice.
    pub async fn next_in(
        &self,
        conn: &mut SqliteConnection,
        tenant_id: &str,
        fiscal_year: &str,
    ) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (tenant_id, fiscal_year, last_value)
            VALUES (?1, ?2, 1)
            ON CONFLICT (tenant_id, fiscal_year)
            DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(tenant_id)
        .bind(fiscal_year)
        .fetch_one(&mut *conn)
        .await?;

        debug!(tenant_id = %tenant_id, fiscal_year = %fiscal_year, value, "Allocated invoice sequence");

        Ok(value)
    }

    /// Allocates a number in its own transaction.
    ///
    /// ## Note
    /// The number is committed immediately, so a caller that fails to use
    /// it leaves a gap. Invoice creation uses [`Self::next_in`] instead.
    pub async fn next(&self, tenant_id: &str, fiscal_year: &str) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let value = self.next_in(&mut tx, tenant_id, fiscal_year).await?;
        tx.commit().await?;
        Ok(value)
    }

    /// Last allocated number, 0 when none has been allocated yet.
    pub async fn current(&self, tenant_id: &str, fiscal_year: &str) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM invoice_sequences WHERE tenant_id = ?1 AND fiscal_year = ?2",
        )
        .bind(tenant_id)
        .bind(fiscal_year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
