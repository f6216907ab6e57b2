//! Invoice lifecycle against an in-memory database.

mod common;

use chrono::Utc;
use common::*;

use labbill_core::command::{ProcessRefundCommand, RecordPaymentCommand, UpdateInvoiceCommand};
use labbill_core::fiscal::{business_offset, FiscalYear};
use labbill_core::{
    CommissionMode, Invoice, IntroducerFlag, Money, PaymentMode, PaymentStatus, TransactionKind,
};
use labbill_engine::{BillingEngine, ErrorCode};

fn payment(r: i64) -> RecordPaymentCommand {
    RecordPaymentCommand {
        paid_amount: rupees(r),
        payment_mode: PaymentMode::Upi,
    }
}

fn refund(r: i64, note: &str) -> ProcessRefundCommand {
    ProcessRefundCommand {
        refund_amount: rupees(r),
        refund_note: note.to_string(),
    }
}

fn assert_invariants(invoice: &Invoice) {
    assert_eq!(
        invoice.net_paise,
        invoice.total_paise - invoice.discount_paise + invoice.tax_paise
    );
    assert_eq!(invoice.cgst_paise + invoice.sgst_paise, invoice.tax_paise);
    assert_eq!(invoice.balance_paise, invoice.net_paise - invoice.paid_paise);
    assert!(invoice.paid_paise >= 0 && invoice.paid_paise <= invoice.net_paise);
    assert!(invoice.refund_paise >= 0 && invoice.refund_paise <= invoice.paid_paise);
}

async fn reload(engine: &BillingEngine, id: &str) -> Invoice {
    engine.get_invoice(&ctx(), id).await.unwrap().invoice
}

#[tokio::test]
async fn single_item_paid_in_full() {
    let engine = engine().await;

    let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 500)).await.unwrap();

    assert_eq!(invoice.total(), rupees(500));
    assert_eq!(invoice.tax_paise, 0);
    assert_eq!(invoice.net(), rupees(500));
    assert_eq!(invoice.payment_status, PaymentStatus::Paid);
    assert_eq!(invoice.balance_paise, 0);
    assert_eq!(invoice.department, "Haematology");
    assert_eq!(invoice.commission_mode, CommissionMode::None);
    assert_invariants(&invoice);

    let fy = FiscalYear::containing(Utc::now(), business_offset(330).unwrap());
    assert_eq!(invoice.invoice_number, format!("INV/{}/00001", fy.short_label()));
    assert_eq!(invoice.fiscal_year, fy.label());

    let detail = engine.get_invoice(&ctx(), &invoice.id).await.unwrap();
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].test_name, "Test T500");
    assert_eq!(detail.transactions.len(), 1);
    assert_eq!(detail.transactions[0].kind, TransactionKind::Payment);
    assert_eq!(detail.transactions[0].amount_paise, 50_000);
}

#[tokio::test]
async fn invoice_numbers_follow_the_sequence() {
    let engine = engine().await;
    let fy = FiscalYear::containing(Utc::now(), business_offset(330).unwrap());

    assert_eq!(engine.current_sequence(&ctx(), fy).await.unwrap(), 0);

    for expected in 1..=3 {
        let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 0)).await.unwrap();
        assert_eq!(invoice.sequence_number, expected);
        assert!(invoice.invoice_number.ends_with(&format!("/{:05}", expected)));
    }

    assert_eq!(engine.current_sequence(&ctx(), fy).await.unwrap(), 3);
}

#[tokio::test]
async fn gst_is_split_with_odd_paisa_to_cgst() {
    let engine = engine().await;

    let invoice = engine.create_invoice(&ctx(), create(draft(&[GST18, ODD]), 0)).await.unwrap();

    // 18.00 + 0.045 rounded half-up to 0.05
    assert_eq!(invoice.tax_paise, 1_805);
    assert_eq!(invoice.cgst_paise, 903);
    assert_eq!(invoice.sgst_paise, 902);
    assert_eq!(invoice.net_paise, 10_025 + 1_805);
    assert_invariants(&invoice);

    let detail = engine.get_invoice(&ctx(), &invoice.id).await.unwrap();
    let taxes: Vec<i64> = detail.items.iter().map(|i| i.tax_paise).collect();
    assert_eq!(taxes, vec![1_800, 5]);
}

#[tokio::test]
async fn discount_applies_once_to_the_whole_invoice() {
    let engine = engine().await;

    let mut with_discount = draft(&[T1000, GST18]);
    with_discount.discount_amount = rupees(100);
    let invoice = engine.create_invoice(&ctx(), create(with_discount, 0)).await.unwrap();

    assert_eq!(invoice.total(), rupees(1100));
    assert_eq!(invoice.discount_paise, 10_000);
    assert_eq!(invoice.net_paise, 110_000 - 10_000 + 1_800);
    assert_eq!(invoice.payment_status, PaymentStatus::Pending);
    assert_invariants(&invoice);
}

#[tokio::test]
async fn create_rejects_bad_drafts_without_writing() {
    let engine = engine().await;
    let fy = FiscalYear::containing(Utc::now(), business_offset(330).unwrap());

    let err = engine.create_invoice(&ctx(), create(draft(&[]), 0)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);

    let mut too_much_discount = draft(&[T500]);
    too_much_discount.discount_amount = rupees(501);
    let err = engine.create_invoice(&ctx(), create(too_much_discount, 0)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);

    let err = engine.create_invoice(&ctx(), create(draft(&[T500]), 501)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);

    let err = engine.create_invoice(&ctx(), create(draft(&[RETIRED]), 0)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);

    let err = engine.create_invoice(&ctx(), create(draft(&["NOPE"]), 0)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let mut unknown_patient = draft(&[T500]);
    unknown_patient.patient_id = "PAT-404".to_string();
    let err = engine.create_invoice(&ctx(), create(unknown_patient, 0)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let mut unknown_doctor = draft(&[T500]);
    unknown_doctor.doctor_id = Some("DR-404".to_string());
    let err = engine.create_invoice(&ctx(), create(unknown_doctor, 0)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    // Nothing was numbered
    assert_eq!(engine.current_sequence(&ctx(), fy).await.unwrap(), 0);
}

#[tokio::test]
async fn zero_net_invoice_is_paid() {
    let engine = engine().await;

    let mut free = draft(&[T500]);
    free.discount_amount = rupees(500);
    let invoice = engine.create_invoice(&ctx(), create(free, 0)).await.unwrap();

    assert_eq!(invoice.net_paise, 0);
    assert_eq!(invoice.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn payments_move_pending_to_partial_to_paid() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 0)).await.unwrap();
    assert_eq!(invoice.payment_status, PaymentStatus::Pending);

    let invoice = engine.record_payment(&ctx(), &invoice.id, payment(300)).await.unwrap();
    assert_eq!(invoice.payment_status, PaymentStatus::Partial);
    assert_eq!(invoice.balance(), rupees(200));
    assert_eq!(invoice.payment_mode, PaymentMode::Upi);
    assert_invariants(&invoice);

    let invoice = engine.record_payment(&ctx(), &invoice.id, payment(200)).await.unwrap();
    assert_eq!(invoice.payment_status, PaymentStatus::Paid);
    assert_eq!(invoice.balance_paise, 0);
    assert_invariants(&invoice);

    let transactions = engine.list_transactions(&ctx(), &invoice.id).await.unwrap();
    let amounts: Vec<i64> = transactions.iter().map(|t| t.amount_paise).collect();
    assert_eq!(amounts, vec![30_000, 20_000]);
}

#[tokio::test]
async fn overpayment_is_rejected_and_leaves_state_unchanged() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T1000]), 700)).await.unwrap();

    let err = engine.record_payment(&ctx(), &invoice.id, payment(400)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Consistency);

    let err = engine
        .record_payment(
            &ctx(),
            &invoice.id,
            RecordPaymentCommand {
                paid_amount: Money::from_paise(-1),
                payment_mode: PaymentMode::Cash,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);

    let current = reload(&engine, &invoice.id).await;
    assert_eq!(current.paid(), rupees(700));
    assert_eq!(current.version, invoice.version);
}

#[tokio::test]
async fn over_refund_is_rejected_and_leaves_state_unchanged() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T1000]), 300)).await.unwrap();

    let invoice = engine
        .process_refund(&ctx(), &invoice.id, refund(100, "sample rejected"))
        .await
        .unwrap();
    assert_eq!(invoice.refunded(), rupees(100));
    assert_eq!(invoice.paid(), rupees(300));
    assert_eq!(invoice.payment_status, PaymentStatus::Partial);

    let err = engine
        .process_refund(&ctx(), &invoice.id, refund(300, "too much"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Consistency);

    let current = reload(&engine, &invoice.id).await;
    assert_eq!(current.refunded(), rupees(100));
    assert_eq!(current.refund_note.as_deref(), Some("sample rejected"));
    assert_eq!(current.version, invoice.version);
    assert_invariants(&current);

    let current = engine
        .process_refund(&ctx(), &invoice.id, refund(200, "  test cancelled  "))
        .await
        .unwrap();
    assert_eq!(current.payment_status, PaymentStatus::Refunded);
    assert_eq!(current.refund_note.as_deref(), Some("test cancelled"));
    assert_eq!(current.balance(), rupees(700));
    assert_invariants(&current);

    let kinds: Vec<TransactionKind> = engine
        .list_transactions(&ctx(), &invoice.id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![TransactionKind::Payment, TransactionKind::Refund, TransactionKind::Refund]
    );
}

#[tokio::test]
async fn refund_requires_positive_amount_and_note() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 500)).await.unwrap();

    let err = engine
        .process_refund(&ctx(), &invoice.id, refund(0, "nothing"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);

    let err = engine
        .process_refund(&ctx(), &invoice.id, refund(100, "   "))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn unknown_and_malformed_invoice_ids() {
    let engine = engine().await;

    let missing = uuid::Uuid::new_v4().to_string();
    let err = engine.record_payment(&ctx(), &missing, payment(1)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = engine.get_invoice(&ctx(), &missing).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = engine.get_invoice(&ctx(), "not-a-uuid").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn invoices_are_tenant_scoped() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 0)).await.unwrap();

    let other = labbill_engine::RequestContext::new("tenant-2", "main", "user-9");
    let err = engine.get_invoice(&other, &invoice.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = engine.record_payment(&other, &invoice.id, payment(1)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn edit_replaces_items_and_recomputes_commission() {
    let engine = engine().await;

    let mut referred = draft(&[T1000]);
    referred.doctor_id = Some(DR_10.to_string());
    let invoice = engine.create_invoice(&ctx(), create(referred.clone(), 0)).await.unwrap();
    assert_eq!(invoice.commission_mode, CommissionMode::Doctor);
    assert_eq!(invoice.doctor_commission_paise, 10_000);

    referred.items = draft(&[T2000, T500]).items;
    let edited = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: referred,
                paid_amount: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.invoice_number, invoice.invoice_number);
    assert_eq!(edited.net(), rupees(2500));
    assert_eq!(edited.doctor_commission_paise, 25_000);
    assert_eq!(edited.updated_by.as_deref(), Some("user-1"));
    assert_invariants(&edited);

    let detail = engine.get_invoice(&ctx(), &invoice.id).await.unwrap();
    let tests: Vec<&str> = detail.items.iter().map(|i| i.test_id.as_str()).collect();
    assert_eq!(tests, vec![T2000, T500]);
    assert!(detail.transactions.is_empty());
}

#[tokio::test]
async fn edit_keeps_billed_prices_after_catalog_change() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 500)).await.unwrap();
    assert_eq!(invoice.payment_status, PaymentStatus::Paid);

    reprice_test(&engine, T500, 70_000).await;

    // Only the referring doctor changes
    let mut referred = draft(&[T500]);
    referred.doctor_id = Some(DR_10.to_string());
    let edited = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: referred.clone(),
                paid_amount: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.net(), rupees(500));
    assert_eq!(edited.payment_status, PaymentStatus::Paid);
    assert_eq!(edited.doctor_commission_paise, 5_000);
    assert_invariants(&edited);

    let detail = engine.get_invoice(&ctx(), &invoice.id).await.unwrap();
    assert_eq!(detail.items[0].price_paise, 50_000);
    assert_eq!(detail.items[0].test_name, "Test T500");
    let kinds: Vec<TransactionKind> = detail.transactions.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TransactionKind::Payment]);

    // A second occurrence is a new line and takes the current price
    referred.items = draft(&[T500, T500]).items;
    let edited = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: referred,
                paid_amount: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.net(), rupees(1200));
    assert_eq!(edited.payment_status, PaymentStatus::Partial);
    assert_invariants(&edited);

    let prices: Vec<i64> = engine
        .get_invoice(&ctx(), &invoice.id)
        .await
        .unwrap()
        .items
        .iter()
        .map(|i| i.price_paise)
        .collect();
    assert_eq!(prices, vec![50_000, 70_000]);
}

#[tokio::test]
async fn edit_rejects_newly_added_inactive_test() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 0)).await.unwrap();

    let err = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: draft(&[T500, RETIRED]),
                paid_amount: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(reload(&engine, &invoice.id).await.net(), rupees(500));
}

#[tokio::test]
async fn edit_paid_override_is_recorded_as_adjustment() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T1000]), 200)).await.unwrap();

    let edited = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: draft(&[T2000]),
                paid_amount: Some(rupees(500)),
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.paid(), rupees(500));
    assert_eq!(edited.balance(), rupees(1500));
    assert_eq!(edited.payment_status, PaymentStatus::Partial);

    let transactions = engine.list_transactions(&ctx(), &invoice.id).await.unwrap();
    let last = transactions.last().unwrap();
    assert_eq!(last.kind, TransactionKind::Adjustment);
    assert_eq!(last.amount_paise, 30_000);

    // Override above the new net
    let err = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: draft(&[T2000]),
                paid_amount: Some(rupees(2001)),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn edit_below_recorded_payments_is_rejected() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T2000]), 1500)).await.unwrap();

    let err = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: draft(&[T1000]),
                paid_amount: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Consistency);

    let current = reload(&engine, &invoice.id).await;
    assert_eq!(current.net(), rupees(2000));
    assert_eq!(engine.get_invoice(&ctx(), &invoice.id).await.unwrap().items[0].test_id, T2000);
}

#[tokio::test]
async fn edit_cannot_leave_refunds_above_paid() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T1000]), 600)).await.unwrap();
    engine
        .process_refund(&ctx(), &invoice.id, refund(400, "partial cancel"))
        .await
        .unwrap();

    let err = engine
        .update_invoice(
            &ctx(),
            &invoice.id,
            UpdateInvoiceCommand {
                draft: draft(&[T1000]),
                paid_amount: Some(rupees(300)),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Consistency);
}

#[tokio::test]
async fn every_mutation_is_audited() {
    let engine = engine().await;
    let invoice = engine.create_invoice(&ctx(), create(draft(&[T500]), 0)).await.unwrap();
    engine.record_payment(&ctx(), &invoice.id, payment(100)).await.unwrap();
    engine
        .process_refund(&ctx(), &invoice.id, refund(50, "duplicate draw"))
        .await
        .unwrap();

    // Rejected operations leave no trace
    let _ = engine.record_payment(&ctx(), &invoice.id, payment(10_000)).await;

    let history = engine.invoice_history(&ctx(), &invoice.id).await.unwrap();
    let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["invoice.create", "invoice.payment", "invoice.refund"]);

    assert!(history[0].before_state.is_none());
    let after: Invoice = serde_json::from_str(history[1].after_state.as_deref().unwrap()).unwrap();
    assert_eq!(after.paid(), rupees(100));
    assert!(history.iter().all(|e| e.actor == "user-1"));
}

#[tokio::test]
async fn preview_prices_without_persisting() {
    let engine = engine().await;
    let fy = FiscalYear::containing(Utc::now(), business_offset(330).unwrap());

    let mut split = draft(&[T2000]);
    split.doctor_id = Some(DR_10.to_string());
    split.introducer_id = Some(INTRO_50.to_string());
    split.department = Some("  Cardiology ".to_string());

    let preview = engine.preview_invoice(&ctx(), &split).await.unwrap();
    assert_eq!(preview.totals.net, rupees(2000));
    assert_eq!(preview.commission.mode, CommissionMode::Split);
    assert_eq!(preview.commission.doctor_commission, rupees(200));
    assert_eq!(preview.commission.introducer_commission, rupees(50));
    assert_eq!(preview.department, "Cardiology");
    assert_eq!(preview.lines.len(), 1);
    assert_eq!(preview.lines[0].price, rupees(2000));

    let mut tagged = draft(&[T500]);
    tagged.introducer_raw = IntroducerFlag::Doctor;
    let preview = engine.preview_invoice(&ctx(), &tagged).await.unwrap();
    assert_eq!(preview.commission.mode, CommissionMode::Introducer);
    assert_eq!(preview.commission.total(), Money::zero());

    assert_eq!(engine.current_sequence(&ctx(), fy).await.unwrap(), 0);
}
