//! # Invoice Repository
//!
//! Database operations for invoices, their items and their transactions.
//!
//! ## Write Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Invoice Writes                                   │
//! │                                                                         │
//! │  CREATE                                                                 │
//! │     └── sequences().next_in()   (takes the write lock)                 │
//! │     └── insert_in()             invoice + items                        │
//! │     └── add_transaction_in()    PAYMENT (when paid up front)           │
//! │                                                                         │
//! │  PAYMENT / REFUND / EDIT                                               │
//! │     └── lock_in()               version = version + 1 (write lock)     │
//! │     └── get_in()                read state under the lock              │
//! │     └── update_payment_in() / replace_in()                             │
//! │     └── add_transaction_in()                                           │
//! │                                                                         │
//! │  (audit().record_in() joins every one of these transactions)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use labbill_core::{Invoice, InvoiceItem, InvoiceTransaction};

const INVOICE_COLUMNS: &str = r#"
    id, tenant_id, branch_id, patient_id, doctor_id, introducer_id, introducer_raw,
    department, invoice_number, fiscal_year, sequence_number,
    total_paise, discount_paise, tax_paise, cgst_paise, sgst_paise, net_paise,
    paid_paise, refund_paise, balance_paise, payment_mode, payment_status,
    commission_mode, doctor_commission_type, doctor_commission_value,
    introducer_commission_type, introducer_commission_value,
    doctor_commission_paise, introducer_commission_paise,
    refund_note, version, created_by, created_at, updated_by, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, invoice_id, test_id, test_name, price_paise, gst_bps, tax_paise,
    sample_id, position, created_at
"#;

const TRANSACTION_COLUMNS: &str = r#"
    id, invoice_id, kind, amount_paise, payment_mode, note, created_by, created_at
"#;

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an invoice by ID.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        self.get_in(&mut conn, tenant_id, id).await
    }

    /// Gets an invoice by ID inside the caller's transaction.
    pub async fn get_in(
        &self,
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE tenant_id = ?1 AND id = ?2",
            INVOICE_COLUMNS
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(invoice)
    }

    /// Gets an invoice by its human-readable number.
    pub async fn get_by_number(&self, tenant_id: &str, invoice_number: &str) -> DbResult<Option<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE tenant_id = ?1 AND invoice_number = ?2",
            INVOICE_COLUMNS
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Every invoice on which a party is the referring doctor or the
    /// introducer, oldest first.
    pub async fn for_party_in(
        &self,
        conn: &mut SqliteConnection,
        tenant_id: &str,
        doctor_id: &str,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            r#"
            SELECT {} FROM invoices
            WHERE tenant_id = ?1 AND (doctor_id = ?2 OR introducer_id = ?2)
            ORDER BY created_at, sequence_number
            "#,
            INVOICE_COLUMNS
        );

        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(doctor_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(invoices)
    }

    /// Items of an invoice in billing order.
    pub async fn items(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let mut conn = self.pool.acquire().await?;
        self.items_in(&mut conn, invoice_id).await
    }

    /// Items of an invoice in billing order, read under the caller's lock.
    pub async fn items_in(&self, conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let sql = format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = ?1 ORDER BY position",
            ITEM_COLUMNS
        );

        let items = sqlx::query_as::<_, InvoiceItem>(&sql)
            .bind(invoice_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(items)
    }

    /// Money movements on an invoice, oldest first.
    pub async fn transactions(&self, invoice_id: &str) -> DbResult<Vec<InvoiceTransaction>> {
        let sql = format!(
            "SELECT {} FROM invoice_transactions WHERE invoice_id = ?1 ORDER BY created_at, rowid",
            TRANSACTION_COLUMNS
        );

        let transactions = sqlx::query_as::<_, InvoiceTransaction>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(transactions)
    }

    // =========================================================================
    // Writes (inside the caller's transaction)
    // =========================================================================

    /// Takes the write lock on an invoice by bumping its version.
    ///
    /// The SQLite counterpart of `SELECT ... FOR UPDATE`: once this returns,
    /// no other transaction can change the invoice until ours ends.
    ///
    /// ## Errors
    /// `NotFound` when the invoice doesn't exist for the tenant.
    pub async fn lock_in(&self, conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE invoices SET version = version + 1 WHERE tenant_id = ?1 AND id = ?2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        Ok(())
    }

    /// Inserts a new invoice with its items.
    pub async fn insert_in(
        &self,
        conn: &mut SqliteConnection,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> DbResult<()> {
        debug!(id = %invoice.id, invoice_number = %invoice.invoice_number, "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, tenant_id, branch_id, patient_id, doctor_id, introducer_id, introducer_raw,
                department, invoice_number, fiscal_year, sequence_number,
                total_paise, discount_paise, tax_paise, cgst_paise, sgst_paise, net_paise,
                paid_paise, refund_paise, balance_paise, payment_mode, payment_status,
                commission_mode, doctor_commission_type, doctor_commission_value,
                introducer_commission_type, introducer_commission_value,
                doctor_commission_paise, introducer_commission_paise,
                refund_note, version, created_by, created_at, updated_by, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21, ?22,
                ?23, ?24, ?25,
                ?26, ?27,
                ?28, ?29,
                ?30, ?31, ?32, ?33, ?34, ?35
            )
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.tenant_id)
        .bind(&invoice.branch_id)
        .bind(&invoice.patient_id)
        .bind(&invoice.doctor_id)
        .bind(&invoice.introducer_id)
        .bind(invoice.introducer_raw)
        .bind(&invoice.department)
        .bind(&invoice.invoice_number)
        .bind(&invoice.fiscal_year)
        .bind(invoice.sequence_number)
        .bind(invoice.total_paise)
        .bind(invoice.discount_paise)
        .bind(invoice.tax_paise)
        .bind(invoice.cgst_paise)
        .bind(invoice.sgst_paise)
        .bind(invoice.net_paise)
        .bind(invoice.paid_paise)
        .bind(invoice.refund_paise)
        .bind(invoice.balance_paise)
        .bind(invoice.payment_mode)
        .bind(invoice.payment_status)
        .bind(invoice.commission_mode)
        .bind(invoice.doctor_commission_type)
        .bind(invoice.doctor_commission_value)
        .bind(invoice.introducer_commission_type)
        .bind(invoice.introducer_commission_value)
        .bind(invoice.doctor_commission_paise)
        .bind(invoice.introducer_commission_paise)
        .bind(&invoice.refund_note)
        .bind(invoice.version)
        .bind(&invoice.created_by)
        .bind(invoice.created_at)
        .bind(&invoice.updated_by)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        self.insert_items_in(conn, items).await
    }

    /// Rewrites an edited invoice and replaces its whole item set.
    ///
    /// Numbering, creation fields and `version` are left untouched.
    pub async fn replace_in(
        &self,
        conn: &mut SqliteConnection,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> DbResult<()> {
        debug!(id = %invoice.id, items = items.len(), "Replacing invoice items");

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                patient_id = ?3,
                doctor_id = ?4,
                introducer_id = ?5,
                introducer_raw = ?6,
                department = ?7,
                total_paise = ?8,
                discount_paise = ?9,
                tax_paise = ?10,
                cgst_paise = ?11,
                sgst_paise = ?12,
                net_paise = ?13,
                paid_paise = ?14,
                refund_paise = ?15,
                balance_paise = ?16,
                payment_mode = ?17,
                payment_status = ?18,
                commission_mode = ?19,
                doctor_commission_type = ?20,
                doctor_commission_value = ?21,
                introducer_commission_type = ?22,
                introducer_commission_value = ?23,
                doctor_commission_paise = ?24,
                introducer_commission_paise = ?25,
                updated_by = ?26,
                updated_at = ?27
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(&invoice.tenant_id)
        .bind(&invoice.id)
        .bind(&invoice.patient_id)
        .bind(&invoice.doctor_id)
        .bind(&invoice.introducer_id)
        .bind(invoice.introducer_raw)
        .bind(&invoice.department)
        .bind(invoice.total_paise)
        .bind(invoice.discount_paise)
        .bind(invoice.tax_paise)
        .bind(invoice.cgst_paise)
        .bind(invoice.sgst_paise)
        .bind(invoice.net_paise)
        .bind(invoice.paid_paise)
        .bind(invoice.refund_paise)
        .bind(invoice.balance_paise)
        .bind(invoice.payment_mode)
        .bind(invoice.payment_status)
        .bind(invoice.commission_mode)
        .bind(invoice.doctor_commission_type)
        .bind(invoice.doctor_commission_value)
        .bind(invoice.introducer_commission_type)
        .bind(invoice.introducer_commission_value)
        .bind(invoice.doctor_commission_paise)
        .bind(invoice.introducer_commission_paise)
        .bind(&invoice.updated_by)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", &invoice.id));
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
            .bind(&invoice.id)
            .execute(&mut *conn)
            .await?;

        self.insert_items_in(conn, items).await
    }

    /// Writes the payment fields of an invoice after a payment or refund.
    pub async fn update_payment_in(&self, conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
        debug!(
            id = %invoice.id,
            paid = invoice.paid_paise,
            refunded = invoice.refund_paise,
            "Updating invoice payment state"
        );

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                paid_paise = ?3,
                refund_paise = ?4,
                balance_paise = ?5,
                payment_mode = ?6,
                payment_status = ?7,
                refund_note = ?8,
                updated_by = ?9,
                updated_at = ?10
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(&invoice.tenant_id)
        .bind(&invoice.id)
        .bind(invoice.paid_paise)
        .bind(invoice.refund_paise)
        .bind(invoice.balance_paise)
        .bind(invoice.payment_mode)
        .bind(invoice.payment_status)
        .bind(&invoice.refund_note)
        .bind(&invoice.updated_by)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", &invoice.id));
        }

        Ok(())
    }

    /// Appends a payment, refund or adjustment row.
    pub async fn add_transaction_in(
        &self,
        conn: &mut SqliteConnection,
        transaction: &InvoiceTransaction,
    ) -> DbResult<()> {
        debug!(
            invoice_id = %transaction.invoice_id,
            kind = ?transaction.kind,
            amount = transaction.amount_paise,
            "Recording invoice transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO invoice_transactions (
                id, invoice_id, kind, amount_paise, payment_mode, note, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.invoice_id)
        .bind(transaction.kind)
        .bind(transaction.amount_paise)
        .bind(transaction.payment_mode)
        .bind(&transaction.note)
        .bind(&transaction.created_by)
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn insert_items_in(&self, conn: &mut SqliteConnection, items: &[InvoiceItem]) -> DbResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, test_id, test_name, price_paise, gst_bps, tax_paise,
                    sample_id, position, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.test_id)
            .bind(&item.test_name)
            .bind(item.price_paise)
            .bind(item.gst_bps)
            .bind(item.tax_paise)
            .bind(&item.sample_id)
            .bind(item.position)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use labbill_core::{
        CommissionMode, IntroducerFlag, LabTest, Patient, PaymentMode, PaymentStatus, TransactionKind,
    };

    async fn seeded_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let registry = db.registry();

        registry
            .insert_patient(&Patient {
                id: "p1".to_string(),
                tenant_id: "t1".to_string(),
                name: "Asha".to_string(),
                uhid: "UH-1".to_string(),
                phone: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        registry
            .insert_test(&LabTest {
                id: "cbc".to_string(),
                tenant_id: "t1".to_string(),
                name: "CBC".to_string(),
                price_paise: 50_000,
                gst_bps: 0,
                department: "Haematology".to_string(),
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        db
    }

    fn invoice(id: &str, sequence: i64) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            branch_id: "main".to_string(),
            patient_id: "p1".to_string(),
            doctor_id: None,
            introducer_id: None,
            introducer_raw: IntroducerFlag::SelfIntroduced,
            department: "Haematology".to_string(),
            invoice_number: format!("INV/25-26/{:05}", sequence),
            fiscal_year: "2025-26".to_string(),
            sequence_number: sequence,
            total_paise: 50_000,
            discount_paise: 0,
            tax_paise: 0,
            cgst_paise: 0,
            sgst_paise: 0,
            net_paise: 50_000,
            paid_paise: 0,
            refund_paise: 0,
            balance_paise: 50_000,
            payment_mode: PaymentMode::Cash,
            payment_status: PaymentStatus::Pending,
            commission_mode: CommissionMode::None,
            doctor_commission_type: None,
            doctor_commission_value: None,
            introducer_commission_type: None,
            introducer_commission_value: None,
            doctor_commission_paise: 0,
            introducer_commission_paise: 0,
            refund_note: None,
            version: 1,
            created_by: "u1".to_string(),
            created_at: now,
            updated_by: None,
            updated_at: now,
        }
    }

    fn item(invoice_id: &str, position: i64) -> InvoiceItem {
        InvoiceItem {
            id: uuid::Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            test_id: "cbc".to_string(),
            test_name: "CBC".to_string(),
            price_paise: 50_000,
            gst_bps: 0,
            tax_paise: 0,
            sample_id: Some(format!("S-{}", position)),
            position,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = seeded_db().await;
        let repo = db.invoices();

        let mut tx = db.begin().await.unwrap();
        repo.insert_in(&mut tx, &invoice("inv-1", 1), &[item("inv-1", 0), item("inv-1", 1)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let loaded = repo.get("t1", "inv-1").await.unwrap().unwrap();
        assert_eq!(loaded.invoice_number, "INV/25-26/00001");
        assert_eq!(loaded.introducer_raw, IntroducerFlag::SelfIntroduced);
        assert_eq!(loaded.payment_status, PaymentStatus::Pending);
        assert_eq!(loaded.version, 1);

        let items = repo.items("inv-1").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].sample_id.as_deref(), Some("S-1"));

        let by_number = repo.get_by_number("t1", "INV/25-26/00001").await.unwrap();
        assert!(by_number.is_some());
        assert!(repo.get("t2", "inv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_invoice_number_rejected() {
        let db = seeded_db().await;
        let repo = db.invoices();

        let mut tx = db.begin().await.unwrap();
        repo.insert_in(&mut tx, &invoice("inv-1", 1), &[]).await.unwrap();
        let err = repo.insert_in(&mut tx, &invoice("inv-2", 1), &[]).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_check_constraints_guard_amounts() {
        let db = seeded_db().await;
        let repo = db.invoices();

        let mut overpaid = invoice("inv-1", 1);
        overpaid.paid_paise = 60_000;
        overpaid.balance_paise = -10_000;

        let mut tx = db.begin().await.unwrap();
        let err = repo.insert_in(&mut tx, &overpaid, &[]).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_lock_and_payment_update() {
        let db = seeded_db().await;
        let repo = db.invoices();

        let mut tx = db.begin().await.unwrap();
        repo.insert_in(&mut tx, &invoice("inv-1", 1), &[item("inv-1", 0)]).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        repo.lock_in(&mut tx, "t1", "inv-1").await.unwrap();
        let mut current = repo.get_in(&mut tx, "t1", "inv-1").await.unwrap().unwrap();
        current.paid_paise = 20_000;
        current.balance_paise = 30_000;
        current.payment_status = PaymentStatus::Partial;
        repo.update_payment_in(&mut tx, &current).await.unwrap();
        repo.add_transaction_in(
            &mut tx,
            &InvoiceTransaction {
                id: uuid::Uuid::new_v4().to_string(),
                invoice_id: "inv-1".to_string(),
                kind: TransactionKind::Payment,
                amount_paise: 20_000,
                payment_mode: Some(PaymentMode::Upi),
                note: None,
                created_by: "u1".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let loaded = repo.get("t1", "inv-1").await.unwrap().unwrap();
        assert_eq!(loaded.paid_paise, 20_000);
        assert_eq!(loaded.payment_status, PaymentStatus::Partial);
        assert_eq!(loaded.version, 2);

        let transactions = repo.transactions("inv-1").await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Payment);
        assert_eq!(transactions[0].payment_mode, Some(PaymentMode::Upi));

        let mut tx = db.begin().await.unwrap();
        let err = repo.lock_in(&mut tx, "t1", "missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_replace_swaps_item_set() {
        let db = seeded_db().await;
        let repo = db.invoices();

        let mut tx = db.begin().await.unwrap();
        repo.insert_in(&mut tx, &invoice("inv-1", 1), &[item("inv-1", 0), item("inv-1", 1)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut edited = invoice("inv-1", 1);
        edited.total_paise = 50_000;
        edited.department = "Biochemistry".to_string();
        edited.updated_by = Some("u2".to_string());

        let mut tx = db.begin().await.unwrap();
        repo.lock_in(&mut tx, "t1", "inv-1").await.unwrap();
        let billed = repo.items_in(&mut tx, "inv-1").await.unwrap();
        assert_eq!(billed.len(), 2);
        assert_eq!(billed[0].sample_id.as_deref(), Some("S-0"));
        repo.replace_in(&mut tx, &edited, &[item("inv-1", 0)]).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = repo.get("t1", "inv-1").await.unwrap().unwrap();
        assert_eq!(loaded.department, "Biochemistry");
        assert_eq!(loaded.updated_by.as_deref(), Some("u2"));
        assert_eq!(repo.items("inv-1").await.unwrap().len(), 1);
    }
}
