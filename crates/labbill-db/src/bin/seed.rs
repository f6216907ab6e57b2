//! # Seed Data Generator
//!
//! Populates the registry tables with a lab catalog, referring doctors and
//! patients for development.
//!
//! ## Usage
//! ```bash
//! # 200 patients (default)
//! cargo run -p labbill-db --bin seed
//!
//! # Custom amount and database path
//! cargo run -p labbill-db --bin seed -- --patients 1000 --db ./data/labbill.db
//!
//! # Another tenant
//! cargo run -p labbill-db --bin seed -- --tenant 00000000-0000-0000-0000-000000000002
//! ```

use chrono::Utc;
use labbill_core::{CommissionType, Doctor, LabTest, Patient, DEFAULT_TENANT_ID};
use labbill_db::{Database, DbConfig};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (id, name, price in paise, GST basis points, department)
const TESTS: &[(&str, &str, i64, u32, &str)] = &[
    ("CBC", "Complete Blood Count", 35_000, 0, "Haematology"),
    ("ESR", "Erythrocyte Sedimentation Rate", 15_000, 0, "Haematology"),
    ("HBA1C", "Glycated Haemoglobin", 55_000, 0, "Biochemistry"),
    ("LIPID", "Lipid Profile", 80_000, 0, "Biochemistry"),
    ("LFT", "Liver Function Test", 90_000, 0, "Biochemistry"),
    ("KFT", "Kidney Function Test", 85_000, 0, "Biochemistry"),
    ("TSH", "Thyroid Stimulating Hormone", 45_000, 0, "Endocrinology"),
    ("VITD", "Vitamin D (25-OH)", 150_000, 0, "Endocrinology"),
    ("URINE", "Urine Routine", 20_000, 0, "Clinical Pathology"),
    ("HOMEKIT", "Home Collection Kit", 10_000, 1800, "Logistics"),
    ("REPORT", "Courier Report Delivery", 5_000, 1800, "Logistics"),
];

/// (id, name, is_introducer, commission type, commission value)
const DOCTORS: &[(&str, &str, bool, CommissionType, i64)] = &[
    ("DR-RAO", "Dr. Rao", false, CommissionType::Percentage, 1000),
    ("DR-IYER", "Dr. Iyer", false, CommissionType::Percentage, 1500),
    ("DR-KHAN", "Dr. Khan", false, CommissionType::Fixed, 5_000),
    ("DR-MEHTA", "Dr. Mehta", true, CommissionType::Percentage, 500),
    ("DR-DAS", "Dr. Das", true, CommissionType::Fixed, 2_500),
];

const FIRST_NAMES: &[&str] = &[
    "Asha", "Ravi", "Meera", "Arjun", "Kavya", "Vikram", "Priya", "Sanjay", "Lakshmi", "Farhan",
];

const LAST_NAMES: &[&str] = &["Sharma", "Reddy", "Nair", "Patel", "Singh", "Menon", "Ali", "Gupta"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut patients: usize = 200;
    let mut db_path = String::from("./labbill_dev.db");
    let mut tenant_id = String::from(DEFAULT_TENANT_ID);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--patients" | "-p" => {
                if i + 1 < args.len() {
                    patients = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("LabBill Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --patients <N>   Number of patients to generate (default: 200)");
                println!("  -d, --db <PATH>      Database file path (default: ./labbill_dev.db)");
                println!("  -t, --tenant <ID>    Tenant id (default: {})", DEFAULT_TENANT_ID);
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let registry = db.registry();
    info!(path = %db_path, tenant_id = %tenant_id, "Connected, migrations applied");

    if registry.get_test(&tenant_id, TESTS[0].0).await?.is_some() {
        warn!("Catalog already seeded for this tenant; delete the database file to regenerate");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let now = Utc::now();

    for (code, name, price_paise, gst_bps, department) in TESTS {
        registry
            .insert_test(&LabTest {
                id: code.to_string(),
                tenant_id: tenant_id.clone(),
                name: name.to_string(),
                price_paise: *price_paise,
                gst_bps: *gst_bps,
                department: department.to_string(),
                is_active: true,
                created_at: now,
            })
            .await?;
    }
    info!(count = TESTS.len(), "Seeded lab tests");

    for (code, name, is_introducer, commission_type, commission_value) in DOCTORS {
        registry
            .insert_doctor(&Doctor {
                id: code.to_string(),
                tenant_id: tenant_id.clone(),
                name: name.to_string(),
                is_introducer: *is_introducer,
                commission_type: *commission_type,
                commission_value: *commission_value,
                is_active: true,
                created_at: now,
            })
            .await?;
    }
    info!(count = DOCTORS.len(), "Seeded doctors");

    let mut generated = 0;
    for index in 0..patients {
        let first = FIRST_NAMES[index % FIRST_NAMES.len()];
        let last = LAST_NAMES[(index / FIRST_NAMES.len()) % LAST_NAMES.len()];
        let patient = Patient {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.clone(),
            name: format!("{} {}", first, last),
            uhid: format!("UH{:06}", index + 1),
            phone: Some(format!("98{:08}", index)),
            created_at: now,
        };

        if let Err(e) = registry.insert_patient(&patient).await {
            warn!(uhid = %patient.uhid, error = %e, "Failed to insert patient");
            continue;
        }
        generated += 1;
    }

    info!(count = generated, elapsed = ?start.elapsed(), "Seeded patients");

    db.close().await;
    Ok(())
}
