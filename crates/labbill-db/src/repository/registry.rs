//! # Registry Repository
//!
//! Patients, lab tests and doctors. Other services own these records; the
//! engine only reads them while billing, apart from the payout lock on a
//! doctor row.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use labbill_core::{Doctor, LabTest, Patient};

/// Repository for registry records.
#[derive(Debug, Clone)]
pub struct RegistryRepository {
    pool: SqlitePool,
}

impl RegistryRepository {
    /// Creates a new RegistryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RegistryRepository { pool }
    }

    // =========================================================================
    // Patients
    // =========================================================================

    pub async fn get_patient(&self, tenant_id: &str, id: &str) -> DbResult<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, tenant_id, name, uhid, phone, created_at
            FROM patients
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patient)
    }

    pub async fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        debug!(id = %patient.id, uhid = %patient.uhid, "Inserting patient");

        sqlx::query(
            r#"
            INSERT INTO patients (id, tenant_id, name, uhid, phone, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&patient.id)
        .bind(&patient.tenant_id)
        .bind(&patient.name)
        .bind(&patient.uhid)
        .bind(&patient.phone)
        .bind(patient.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Lab Tests
    // =========================================================================

    pub async fn get_test(&self, tenant_id: &str, id: &str) -> DbResult<Option<LabTest>> {
        let test = sqlx::query_as::<_, LabTest>(
            r#"
            SELECT id, tenant_id, name, price_paise, gst_bps, department, is_active, created_at
            FROM lab_tests
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(test)
    }

    /// Loads tests in the order of `ids`, repeating duplicates.
    ///
    /// ## Errors
    /// `NotFound` for the first id that doesn't exist for the tenant.
    /// Inactive tests are returned; callers decide whether to bill them.
    pub async fn get_tests(&self, tenant_id: &str, ids: &[&str]) -> DbResult<Vec<LabTest>> {
        let mut tests = Vec::with_capacity(ids.len());

        for id in ids {
            let test = self
                .get_test(tenant_id, id)
                .await?
                .ok_or_else(|| DbError::not_found("LabTest", *id))?;
            tests.push(test);
        }

        Ok(tests)
    }

    pub async fn insert_test(&self, test: &LabTest) -> DbResult<()> {
        debug!(id = %test.id, name = %test.name, "Inserting lab test");

        sqlx::query(
            r#"
            INSERT INTO lab_tests (
                id, tenant_id, name, price_paise, gst_bps, department, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&test.id)
        .bind(&test.tenant_id)
        .bind(&test.name)
        .bind(test.price_paise)
        .bind(test.gst_bps)
        .bind(&test.department)
        .bind(test.is_active)
        .bind(test.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes a test's catalog price. Existing invoice items keep their
    /// snapshot.
    pub async fn update_test_price(&self, tenant_id: &str, id: &str, price_paise: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE lab_tests SET price_paise = ?3 WHERE tenant_id = ?1 AND id = ?2")
            .bind(tenant_id)
            .bind(id)
            .bind(price_paise)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("LabTest", id));
        }

        Ok(())
    }

    // =========================================================================
    // Doctors
    // =========================================================================

    pub async fn get_doctor(&self, tenant_id: &str, id: &str) -> DbResult<Option<Doctor>> {
        let doctor = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, tenant_id, name, is_introducer, commission_type, commission_value,
                   is_active, created_at
            FROM doctors
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doctor)
    }

    pub async fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        debug!(id = %doctor.id, name = %doctor.name, "Inserting doctor");

        sqlx::query(
            r#"
            INSERT INTO doctors (
                id, tenant_id, name, is_introducer, commission_type, commission_value,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&doctor.id)
        .bind(&doctor.tenant_id)
        .bind(&doctor.name)
        .bind(doctor.is_introducer)
        .bind(doctor.commission_type)
        .bind(doctor.commission_value)
        .bind(doctor.is_active)
        .bind(doctor.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes a doctor's commission rate. Invoices keep their snapshot.
    pub async fn update_doctor_rate(&self, doctor: &Doctor) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE doctors SET commission_type = ?3, commission_value = ?4
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(&doctor.tenant_id)
        .bind(&doctor.id)
        .bind(doctor.commission_type)
        .bind(doctor.commission_value)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Doctor", &doctor.id));
        }

        Ok(())
    }

    /// Takes the write lock on a doctor row so payouts for the same doctor
    /// serialize.
    ///
    /// ## Errors
    /// `NotFound` when the doctor doesn't exist for the tenant.
    pub async fn lock_doctor_in(
        &self,
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE doctors SET payout_version = payout_version + 1 WHERE tenant_id = ?1 AND id = ?2",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Doctor", id));
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
    use labbill_core::CommissionType;

    fn test_record(id: &str, price_paise: i64) -> LabTest {
        LabTest {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            name: id.to_uppercase(),
            price_paise,
            gst_bps: 1800,
            department: "Pathology".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_tests_round_trip_in_requested_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let registry = db.registry();

        registry.insert_test(&test_record("cbc", 50_000)).await.unwrap();
        registry.insert_test(&test_record("lipid", 120_000)).await.unwrap();

        let tests = registry.get_tests("t1", &["lipid", "cbc", "lipid"]).await.unwrap();
        let names: Vec<_> = tests.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(names, vec!["lipid", "cbc", "lipid"]);
        assert_eq!(tests[0].gst_bps, 1800);

        let err = registry.get_tests("t1", &["cbc", "missing"]).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // Tenant scoped
        assert!(registry.get_test("t2", "cbc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_doctor_round_trip_and_lock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let registry = db.registry();

        let doctor = Doctor {
            id: "doc-1".to_string(),
            tenant_id: "t1".to_string(),
            name: "Dr. Rao".to_string(),
            is_introducer: false,
            commission_type: CommissionType::Fixed,
            commission_value: 5_000,
            is_active: true,
            created_at: Utc::now(),
        };
        registry.insert_doctor(&doctor).await.unwrap();

        let loaded = registry.get_doctor("t1", "doc-1").await.unwrap().unwrap();
        assert_eq!(loaded.commission_type, CommissionType::Fixed);
        assert_eq!(loaded.commission_value, 5_000);

        let mut tx = db.begin().await.unwrap();
        registry.lock_doctor_in(&mut tx, "t1", "doc-1").await.unwrap();
        let err = registry.lock_doctor_in(&mut tx, "t1", "nobody").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        tx.commit().await.unwrap();
    }
}
