//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use chrono::Utc;
use std::path::PathBuf;

use labbill_core::command::{CreateInvoiceCommand, DraftLineItem, InvoiceDraft};
use labbill_core::{
    CommissionType, Doctor, IntroducerFlag, LabTest, Money, Patient, PaymentMode, DEFAULT_TENANT_ID,
};
use labbill_db::{Database, DbConfig};
use labbill_engine::{BillingEngine, EngineConfig, RequestContext};

pub const PATIENT: &str = "PAT-1";

/// ₹500, no GST
pub const T500: &str = "T500";
/// ₹1000, no GST
pub const T1000: &str = "T1000";
/// ₹2000, no GST
pub const T2000: &str = "T2000";
/// ₹100 at 18% GST
pub const GST18: &str = "GST18";
/// 25 paise at 18% GST, tax rounds half-up to 5 paise
pub const ODD: &str = "ODD";
pub const RETIRED: &str = "RETIRED";

/// 10% referring doctor
pub const DR_10: &str = "DR-10";
/// Introducer on a fixed ₹50
pub const INTRO_50: &str = "INTRO-50";
/// Introducer on 5%
pub const INTRO_5: &str = "INTRO-5";

pub fn ctx() -> RequestContext {
    RequestContext::default_tenant("main", "user-1")
}

/// Engine on a private in-memory database with the registry seeded.
pub async fn engine() -> BillingEngine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed(&db).await;
    BillingEngine::new(db, &EngineConfig::default()).unwrap()
}

/// Engine on a temporary database file, for tests that need real
/// concurrent connections.
pub async fn file_engine(tag: &str) -> (BillingEngine, PathBuf) {
    let path = std::env::temp_dir().join(format!("labbill-{}-{}.db", tag, uuid::Uuid::new_v4()));
    let config = EngineConfig {
        database_path: path.clone(),
        max_connections: 8,
        busy_timeout_ms: 30_000,
        operation_timeout_ms: 60_000,
        ..EngineConfig::default()
    };

    let engine = BillingEngine::connect(config).await.unwrap();
    seed(engine.database()).await;
    (engine, path)
}

pub async fn cleanup(engine: BillingEngine, path: PathBuf) {
    engine.database().close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

async fn seed(db: &Database) {
    let registry = db.registry();
    let now = Utc::now();

    registry
        .insert_patient(&Patient {
            id: PATIENT.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            name: "Asha Nair".to_string(),
            uhid: "UH000001".to_string(),
            phone: None,
            created_at: now,
        })
        .await
        .unwrap();

    let tests = [
        (T500, 50_000, 0, "Haematology", true),
        (T1000, 100_000, 0, "Biochemistry", true),
        (T2000, 200_000, 0, "Endocrinology", true),
        (GST18, 10_000, 1800, "Logistics", true),
        (ODD, 25, 1800, "Logistics", true),
        (RETIRED, 30_000, 0, "Haematology", false),
    ];
    for (id, price_paise, gst_bps, department, is_active) in tests {
        registry
            .insert_test(&LabTest {
                id: id.to_string(),
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                name: format!("Test {}", id),
                price_paise,
                gst_bps,
                department: department.to_string(),
                is_active,
                created_at: now,
            })
            .await
            .unwrap();
    }

    let doctors = [
        (DR_10, false, CommissionType::Percentage, 1000),
        (INTRO_50, true, CommissionType::Fixed, 5_000),
        (INTRO_5, true, CommissionType::Percentage, 500),
    ];
    for (id, is_introducer, commission_type, commission_value) in doctors {
        registry
            .insert_doctor(&Doctor {
                id: id.to_string(),
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                name: format!("Dr. {}", id),
                is_introducer,
                commission_type,
                commission_value,
                is_active: true,
                created_at: now,
            })
            .await
            .unwrap();
    }
}

/// Changes a catalog price after invoices have been billed.
pub async fn reprice_test(engine: &BillingEngine, test_id: &str, price_paise: i64) {
    engine
        .database()
        .registry()
        .update_test_price(DEFAULT_TENANT_ID, test_id, price_paise)
        .await
        .unwrap();
}

/// Changes a doctor's registry rate after invoices have been billed.
pub async fn rerate_doctor(engine: &BillingEngine, doctor_id: &str, commission_type: CommissionType, value: i64) {
    let registry = engine.database().registry();
    let mut doctor = registry.get_doctor(DEFAULT_TENANT_ID, doctor_id).await.unwrap().unwrap();
    doctor.commission_type = commission_type;
    doctor.commission_value = value;
    registry.update_doctor_rate(&doctor).await.unwrap();
}

pub fn draft(tests: &[&str]) -> InvoiceDraft {
    InvoiceDraft {
        patient_id: PATIENT.to_string(),
        doctor_id: None,
        introducer_id: None,
        introducer_raw: IntroducerFlag::Unset,
        department: None,
        items: tests.iter().map(|id| DraftLineItem::new(*id)).collect(),
        discount_amount: Money::zero(),
        payment_mode: PaymentMode::Cash,
    }
}

pub fn create(draft: InvoiceDraft, paid_rupees: i64) -> CreateInvoiceCommand {
    CreateInvoiceCommand {
        draft,
        paid_amount: Money::from_rupees(paid_rupees),
    }
}

pub fn rupees(r: i64) -> Money {
    Money::from_rupees(r)
}
