//! # Payout Repository
//!
//! Commission payouts. Rows are immutable once written; the outstanding
//! balance is always recomputed from invoices minus the sum of payouts.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use labbill_core::Payout;

const PAYOUT_COLUMNS: &str = r#"
    id, tenant_id, doctor_id, amount_paise, payment_date, payment_mode,
    reference_number, notes, created_by, created_at
"#;

/// Repository for payout operations.
#[derive(Debug, Clone)]
pub struct PayoutRepository {
    pool: SqlitePool,
}

impl PayoutRepository {
    /// Creates a new PayoutRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PayoutRepository { pool }
    }

    /// Inserts a payout inside the caller's transaction.
    ///
    /// The caller must already hold the doctor's payout lock
    /// (see `RegistryRepository::lock_doctor_in`).
    pub async fn insert_in(&self, conn: &mut SqliteConnection, payout: &Payout) -> DbResult<()> {
        debug!(id = %payout.id, doctor_id = %payout.doctor_id, amount = payout.amount_paise, "Inserting payout");

        sqlx::query(
            r#"
            INSERT INTO payouts (
                id, tenant_id, doctor_id, amount_paise, payment_date, payment_mode,
                reference_number, notes, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payout.id)
        .bind(&payout.tenant_id)
        .bind(&payout.doctor_id)
        .bind(payout.amount_paise)
        .bind(payout.payment_date)
        .bind(payout.payment_mode)
        .bind(&payout.reference_number)
        .bind(&payout.notes)
        .bind(&payout.created_by)
        .bind(payout.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Every payout made to a doctor, read inside the caller's transaction.
    pub async fn for_doctor_in(
        &self,
        conn: &mut SqliteConnection,
        tenant_id: &str,
        doctor_id: &str,
    ) -> DbResult<Vec<Payout>> {
        let sql = format!(
            "SELECT {} FROM payouts WHERE tenant_id = ?1 AND doctor_id = ?2 ORDER BY created_at DESC, rowid DESC",
            PAYOUT_COLUMNS
        );

        let payouts = sqlx::query_as::<_, Payout>(&sql)
            .bind(tenant_id)
            .bind(doctor_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(payouts)
    }

    /// Payout history for a doctor, newest first.
    pub async fn for_doctor(&self, tenant_id: &str, doctor_id: &str) -> DbResult<Vec<Payout>> {
        let mut conn = self.pool.acquire().await?;
        self.for_doctor_in(&mut conn, tenant_id, doctor_id).await
    }
}
