//! # Invoice Operations
//!
//! Creation, edits, payments and refunds, plus the read-only preview.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_invoice ──► PENDING / PARTIAL / PAID                           │
//! │                          │                                              │
//! │   record_payment ────────┤  paid += amount        (≤ balance)          │
//! │   process_refund ────────┤  refund += amount      (≤ paid − refund)    │
//! │   update_invoice ────────┘  items replaced, totals + commission redone │
//! │                                                                         │
//! │  Status is recomputed after every step:                                │
//! │  REFUNDED ► PAID ► PENDING ► PARTIAL (first match)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};
use uuid::Uuid;

use labbill_core::command::{
    CreateInvoiceCommand, InvoiceDraft, ProcessRefundCommand, RecordPaymentCommand,
    UpdateInvoiceCommand,
};
use labbill_core::commission::{self, CommissionBreakdown, IntroducerAttribution, ReferralParty};
use labbill_core::fiscal::{format_invoice_number, FiscalYear};
use labbill_core::lifecycle::{PaymentState, RefundPolicy};
use labbill_core::tax::{calculate_totals, InvoiceTotals, TaxableLine};
use labbill_core::validation::{validate_required_id, validate_uuid};
use labbill_core::{
    AuditEntry, CommissionMode, CommissionRate, CommissionType, Invoice, InvoiceItem,
    InvoiceTransaction, LabTest, Money, PaymentMode, PaymentStatus, Percentage, TransactionKind,
    ValidationError,
};
use labbill_db::DbError;

use crate::engine::{BillingEngine, RequestContext};
use crate::error::{EngineError, EngineResult};

const INVOICE_ENTITY: &str = "invoice";

// =============================================================================
// Response Types
// =============================================================================

/// An invoice with its items and money movements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub transactions: Vec<InvoiceTransaction>,
}

/// One priced line of a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewLine {
    pub test_id: String,
    pub test_name: String,
    pub price: Money,
    pub gst: Percentage,
    pub tax: Money,
}

/// What an invoice would look like, without writing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePreview {
    pub lines: Vec<PreviewLine>,
    pub department: String,
    pub totals: InvoiceTotals,
    pub commission: CommissionBreakdown,
}

/// Registry rows a draft refers to, read before any transaction opens.
struct DraftLookup {
    tests: Vec<LabTest>,
    doctor: Option<ReferralParty>,
    introducer: IntroducerAttribution,
}

/// What an invoice already bills: its stored lines and rate snapshot.
struct Billed<'a> {
    invoice: &'a Invoice,
    items: &'a [InvoiceItem],
}

/// A line as it will be billed.
struct PricedLine {
    test_id: String,
    test_name: String,
    price: Money,
    gst: Percentage,
}

impl PricedLine {
    fn from_catalog(test: &LabTest) -> Self {
        PricedLine {
            test_id: test.id.clone(),
            test_name: test.name.clone(),
            price: test.price(),
            gst: test.gst(),
        }
    }

    fn from_item(item: &InvoiceItem) -> Self {
        PricedLine {
            test_id: item.test_id.clone(),
            test_name: item.test_name.clone(),
            price: item.price(),
            gst: Percentage::from_bps(item.gst_bps),
        }
    }
}

/// A draft priced and its commission resolved.
struct PricedDraft {
    lines: Vec<PricedLine>,
    totals: InvoiceTotals,
    commission: CommissionBreakdown,
    department: String,
}

// =============================================================================
// Operations
// =============================================================================

impl BillingEngine {
    /// Prices a draft and resolves its commission without persisting anything.
    pub async fn preview_invoice(&self, ctx: &RequestContext, draft: &InvoiceDraft) -> EngineResult<InvoicePreview> {
        self.bounded("preview_invoice", async {
            ctx.validate()?;
            draft.validate()?;

            let lookup = self.look_up_draft(&ctx.tenant_id, draft).await?;
            let priced = price_draft(draft, lookup, None)?;

            let lines = priced
                .lines
                .into_iter()
                .zip(&priced.totals.line_taxes)
                .map(|(line, tax)| PreviewLine {
                    test_id: line.test_id,
                    test_name: line.test_name,
                    price: line.price,
                    gst: line.gst,
                    tax: *tax,
                })
                .collect();

            Ok::<_, EngineError>(InvoicePreview {
                lines,
                department: priced.department,
                totals: priced.totals,
                commission: priced.commission,
            })
        })
        .await
    }

    /// Creates an invoice, allocating its number in the same transaction.
    ///
    /// ## Errors
    /// - `VALIDATION` for a bad draft, an inactive test, a discount above the
    ///   bill or `paid_amount` above the net amount
    /// - `NOT_FOUND` for an unknown patient, test, doctor or introducer
    pub async fn create_invoice(&self, ctx: &RequestContext, command: CreateInvoiceCommand) -> EngineResult<Invoice> {
        self.bounded("create_invoice", async {
            ctx.validate()?;
            command.validate()?;

            let draft = &command.draft;
            let lookup = self.look_up_draft(&ctx.tenant_id, draft).await?;
            let priced = price_draft(draft, lookup, None)?;
            let state = PaymentState::opening(priced.totals.net, command.paid_amount)?;

            let now = Utc::now();
            let fiscal_year = FiscalYear::containing(now, self.business_offset);
            let invoices = self.db.invoices();

            let mut tx = self.db.begin().await?;
            let sequence = self
                .db
                .sequences()
                .next_in(&mut tx, &ctx.tenant_id, &fiscal_year.label())
                .await?;

            let mut invoice = Invoice {
                id: Uuid::new_v4().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                branch_id: ctx.branch_id.clone(),
                patient_id: String::new(),
                doctor_id: None,
                introducer_id: None,
                introducer_raw: draft.introducer_raw,
                department: String::new(),
                invoice_number: format_invoice_number(&self.invoice_prefix, fiscal_year, sequence),
                fiscal_year: fiscal_year.label(),
                sequence_number: sequence,
                total_paise: 0,
                discount_paise: 0,
                tax_paise: 0,
                cgst_paise: 0,
                sgst_paise: 0,
                net_paise: 0,
                paid_paise: 0,
                refund_paise: 0,
                balance_paise: 0,
                payment_mode: draft.payment_mode,
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
                created_by: ctx.user_id.clone(),
                created_at: now,
                updated_by: None,
                updated_at: now,
            };
            apply_pricing(&mut invoice, draft, &priced);
            apply_payment_state(&mut invoice, &state, &self.refund_policy);

            let items = build_items(&invoice.id, draft, &priced, now);
            invoices.insert_in(&mut tx, &invoice, &items).await?;

            if state.paid.is_positive() {
                let payment = movement(
                    &invoice.id,
                    TransactionKind::Payment,
                    state.paid,
                    Some(draft.payment_mode),
                    None,
                    ctx,
                    now,
                );
                invoices.add_transaction_in(&mut tx, &payment).await?;
            }

            self.audit_in(&mut tx, ctx, "invoice.create", (INVOICE_ENTITY, &invoice.id), None, Some(&invoice))
                .await?;
            tx.commit().await.map_err(DbError::from)?;

            info!(
                invoice_id = %invoice.id,
                invoice_number = %invoice.invoice_number,
                net = %invoice.net(),
                paid = %invoice.paid(),
                status = ?invoice.payment_status,
                commission_mode = ?invoice.commission_mode,
                "Invoice created"
            );

            Ok::<_, EngineError>(invoice)
        })
        .await
    }

    /// Replaces an invoice's items and recomputes totals and commission.
    ///
    /// Lines already on the invoice keep the price, GST and name they were
    /// billed at; only newly added tests are priced from the catalog. A
    /// party that stays in the same role keeps its stored rate, while a new
    /// or changed party is billed at its current registry rate. A supplied
    /// `paid_amount` overwrites the recorded paid amount and is logged as
    /// an ADJUSTMENT.
    ///
    /// ## Errors
    /// - `VALIDATION` when a newly added test is inactive
    /// - `CONSISTENCY` when the recorded paid amount exceeds the new net
    ///   amount (refund first), or refunds would exceed the resulting paid
    ///   amount
    pub async fn update_invoice(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        command: UpdateInvoiceCommand,
    ) -> EngineResult<Invoice> {
        self.bounded("update_invoice", async {
            ctx.validate()?;
            validate_uuid(invoice_id)?;
            command.validate()?;

            let draft = &command.draft;
            let lookup = self.look_up_draft(&ctx.tenant_id, draft).await?;
            let invoices = self.db.invoices();

            let mut tx = self.db.begin().await?;
            invoices.lock_in(&mut tx, &ctx.tenant_id, invoice_id).await?;
            let before = invoices
                .get_in(&mut tx, &ctx.tenant_id, invoice_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Invoice", invoice_id))?;
            let billed_items = invoices.items_in(&mut tx, &before.id).await?;

            let billed = Billed {
                invoice: &before,
                items: &billed_items,
            };
            let priced = price_draft(draft, lookup, Some(billed))?;

            let state = PaymentState::of(&before).reprice(&before.id, priced.totals.net, command.paid_amount)?;

            let now = Utc::now();
            let mut after = before.clone();
            apply_pricing(&mut after, draft, &priced);
            apply_payment_state(&mut after, &state, &self.refund_policy);
            after.updated_by = Some(ctx.user_id.clone());
            after.updated_at = now;

            let items = build_items(&after.id, draft, &priced, now);
            invoices.replace_in(&mut tx, &after, &items).await?;

            let delta = state.paid - before.paid();
            if !delta.is_zero() {
                warn!(
                    invoice_id = %after.id,
                    previous_paid = %before.paid(),
                    paid = %state.paid,
                    "Invoice edit overwrote the paid amount"
                );
                let adjustment = movement(
                    &after.id,
                    TransactionKind::Adjustment,
                    delta,
                    Some(draft.payment_mode),
                    Some("paid amount overwritten by invoice edit".to_string()),
                    ctx,
                    now,
                );
                invoices.add_transaction_in(&mut tx, &adjustment).await?;
            }

            self.audit_in(
                &mut tx,
                ctx,
                "invoice.update",
                (INVOICE_ENTITY, &after.id),
                Some(&before),
                Some(&after),
            )
            .await?;
            tx.commit().await.map_err(DbError::from)?;

            info!(
                invoice_id = %after.id,
                previous_net = %before.net(),
                net = %after.net(),
                items = items.len(),
                status = ?after.payment_status,
                "Invoice updated"
            );

            Ok::<_, EngineError>(after)
        })
        .await
    }

    /// Records a payment against the outstanding balance.
    ///
    /// ## Errors
    /// - `VALIDATION` for a negative amount
    /// - `CONSISTENCY` when the amount exceeds the balance
    pub async fn record_payment(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        command: RecordPaymentCommand,
    ) -> EngineResult<Invoice> {
        self.bounded("record_payment", async {
            ctx.validate()?;
            validate_uuid(invoice_id)?;
            command.validate()?;

            let invoices = self.db.invoices();

            let mut tx = self.db.begin().await?;
            invoices.lock_in(&mut tx, &ctx.tenant_id, invoice_id).await?;
            let before = invoices
                .get_in(&mut tx, &ctx.tenant_id, invoice_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Invoice", invoice_id))?;

            let state = PaymentState::of(&before).apply_payment(command.paid_amount)?;

            let now = Utc::now();
            let mut after = before.clone();
            apply_payment_state(&mut after, &state, &self.refund_policy);
            after.payment_mode = command.payment_mode;
            after.updated_by = Some(ctx.user_id.clone());
            after.updated_at = now;

            invoices.update_payment_in(&mut tx, &after).await?;

            if command.paid_amount.is_positive() {
                let payment = movement(
                    &after.id,
                    TransactionKind::Payment,
                    command.paid_amount,
                    Some(command.payment_mode),
                    None,
                    ctx,
                    now,
                );
                invoices.add_transaction_in(&mut tx, &payment).await?;
            }

            self.audit_in(
                &mut tx,
                ctx,
                "invoice.payment",
                (INVOICE_ENTITY, &after.id),
                Some(&before),
                Some(&after),
            )
            .await?;
            tx.commit().await.map_err(DbError::from)?;

            info!(
                invoice_id = %after.id,
                amount = %command.paid_amount,
                paid = %after.paid(),
                balance = %after.balance(),
                status = ?after.payment_status,
                "Payment recorded"
            );

            Ok::<_, EngineError>(after)
        })
        .await
    }

    /// Refunds part or all of what has been paid. `paid_amount` is left
    /// as is; `refund_amount` grows.
    ///
    /// ## Errors
    /// - `VALIDATION` for a non-positive amount or a blank note
    /// - `CONSISTENCY` when the amount exceeds `paid − refund`
    pub async fn process_refund(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        command: ProcessRefundCommand,
    ) -> EngineResult<Invoice> {
        self.bounded("process_refund", async {
            ctx.validate()?;
            validate_uuid(invoice_id)?;
            command.validate()?;

            let invoices = self.db.invoices();

            let mut tx = self.db.begin().await?;
            invoices.lock_in(&mut tx, &ctx.tenant_id, invoice_id).await?;
            let before = invoices
                .get_in(&mut tx, &ctx.tenant_id, invoice_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Invoice", invoice_id))?;

            let state = PaymentState::of(&before).apply_refund(command.refund_amount)?;
            let note = command.refund_note.trim().to_string();

            let now = Utc::now();
            let mut after = before.clone();
            apply_payment_state(&mut after, &state, &self.refund_policy);
            after.refund_note = Some(note.clone());
            after.updated_by = Some(ctx.user_id.clone());
            after.updated_at = now;

            invoices.update_payment_in(&mut tx, &after).await?;

            let refund = movement(
                &after.id,
                TransactionKind::Refund,
                command.refund_amount,
                None,
                Some(note),
                ctx,
                now,
            );
            invoices.add_transaction_in(&mut tx, &refund).await?;

            self.audit_in(
                &mut tx,
                ctx,
                "invoice.refund",
                (INVOICE_ENTITY, &after.id),
                Some(&before),
                Some(&after),
            )
            .await?;
            tx.commit().await.map_err(DbError::from)?;

            info!(
                invoice_id = %after.id,
                amount = %command.refund_amount,
                refunded = %after.refunded(),
                status = ?after.payment_status,
                "Refund processed"
            );

            Ok::<_, EngineError>(after)
        })
        .await
    }

    /// An invoice with its items and transactions.
    pub async fn get_invoice(&self, ctx: &RequestContext, invoice_id: &str) -> EngineResult<InvoiceDetail> {
        self.bounded("get_invoice", async {
            ctx.validate()?;
            validate_uuid(invoice_id)?;

            let invoice = self.load_invoice(ctx, invoice_id).await?;
            let invoices = self.db.invoices();
            let items = invoices.items(&invoice.id).await?;
            let transactions = invoices.transactions(&invoice.id).await?;

            Ok::<_, EngineError>(InvoiceDetail {
                invoice,
                items,
                transactions,
            })
        })
        .await
    }

    /// Money movements on an invoice, oldest first.
    pub async fn list_transactions(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
    ) -> EngineResult<Vec<InvoiceTransaction>> {
        self.bounded("list_transactions", async {
            ctx.validate()?;
            validate_uuid(invoice_id)?;

            let invoice = self.load_invoice(ctx, invoice_id).await?;
            Ok::<_, EngineError>(self.db.invoices().transactions(&invoice.id).await?)
        })
        .await
    }

    /// Audit history of an invoice, oldest first.
    pub async fn invoice_history(&self, ctx: &RequestContext, invoice_id: &str) -> EngineResult<Vec<AuditEntry>> {
        self.bounded("invoice_history", async {
            ctx.validate()?;
            validate_uuid(invoice_id)?;

            let invoice = self.load_invoice(ctx, invoice_id).await?;
            Ok::<_, EngineError>(self
                .db
                .audit()
                .for_entity(&ctx.tenant_id, INVOICE_ENTITY, &invoice.id)
                .await?)
        })
        .await
    }

    /// Last invoice sequence number allocated in a fiscal year, 0 if none.
    pub async fn current_sequence(&self, ctx: &RequestContext, fiscal_year: FiscalYear) -> EngineResult<i64> {
        self.bounded("current_sequence", async {
            ctx.validate()?;
            Ok::<_, EngineError>(self
                .db
                .sequences()
                .current(&ctx.tenant_id, &fiscal_year.label())
                .await?)
        })
        .await
    }

    async fn load_invoice(&self, ctx: &RequestContext, invoice_id: &str) -> EngineResult<Invoice> {
        self.db
            .invoices()
            .get(&ctx.tenant_id, invoice_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Invoice", invoice_id))
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Reads the patient, the catalog rows and the parties a draft names.
    ///
    /// Unknown ids fail here with `NOT_FOUND`. Whether an inactive test may
    /// be billed depends on what the invoice already carries, so that check
    /// is left to [`price_draft`].
    async fn look_up_draft(&self, tenant_id: &str, draft: &InvoiceDraft) -> EngineResult<DraftLookup> {
        let registry = self.db.registry();

        registry
            .get_patient(tenant_id, &draft.patient_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Patient", &draft.patient_id))?;

        let ids: Vec<&str> = draft.items.iter().map(|item| item.test_id.as_str()).collect();
        let tests = registry.get_tests(tenant_id, &ids).await?;

        let doctor = match draft.referring_doctor_id() {
            Some(id) => Some(self.referral_party(tenant_id, id).await?),
            None => None,
        };
        let introducer = match draft.registered_introducer_id() {
            Some(id) => IntroducerAttribution::Registered(self.referral_party(tenant_id, id).await?),
            None => IntroducerAttribution::Raw(draft.introducer_raw),
        };

        Ok(DraftLookup {
            tests,
            doctor,
            introducer,
        })
    }

    async fn referral_party(&self, tenant_id: &str, doctor_id: &str) -> EngineResult<ReferralParty> {
        validate_required_id("doctor_id", doctor_id)?;

        let doctor = self
            .db
            .registry()
            .get_doctor(tenant_id, doctor_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Doctor", doctor_id))?;

        Ok(ReferralParty::from(&doctor))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Runs the calculator and the commission resolver over a looked-up draft.
///
/// With `billed` set, each draft line is matched against the stored items
/// by test id, in order of occurrence, and a matched line carries its
/// stored snapshot forward. Unmatched lines are priced from the catalog and
/// must be active.
fn price_draft(draft: &InvoiceDraft, lookup: DraftLookup, billed: Option<Billed<'_>>) -> EngineResult<PricedDraft> {
    let DraftLookup {
        tests,
        mut doctor,
        mut introducer,
    } = lookup;

    let mut kept: HashMap<&str, VecDeque<&InvoiceItem>> = HashMap::new();
    if let Some(billed) = &billed {
        for item in billed.items {
            kept.entry(item.test_id.as_str()).or_default().push_back(item);
        }
    }

    let mut lines = Vec::with_capacity(tests.len());
    let mut carried = 0;
    for test in &tests {
        match kept.get_mut(test.id.as_str()).and_then(VecDeque::pop_front) {
            Some(item) => {
                carried += 1;
                lines.push(PricedLine::from_item(item));
            }
            None if test.is_active => lines.push(PricedLine::from_catalog(test)),
            None => {
                return Err(ValidationError::Inactive {
                    entity: "LabTest".to_string(),
                    id: test.id.clone(),
                }
                .into())
            }
        }
    }

    if let Some(billed) = &billed {
        let invoice = billed.invoice;
        if let Some(party) = doctor.as_mut() {
            keep_rate(party, invoice.doctor_id.as_deref(), invoice.doctor_rate());
        }
        if let IntroducerAttribution::Registered(party) = &mut introducer {
            keep_rate(party, invoice.introducer_id.as_deref(), invoice.introducer_rate());
        }
    }

    let taxable: Vec<TaxableLine> = lines
        .iter()
        .map(|line| TaxableLine::new(line.price, line.gst))
        .collect();
    let totals = calculate_totals(&taxable, draft.discount_amount)?;

    let commission = commission::resolve(doctor.as_ref(), &introducer, totals.net);

    let department = draft
        .department
        .as_deref()
        .map(str::trim)
        .filter(|department| !department.is_empty())
        .map(str::to_string)
        .or_else(|| tests.first().map(|test| test.department.clone()))
        .unwrap_or_default();

    debug!(
        lines = lines.len(),
        carried,
        net = %totals.net,
        commission_mode = ?commission.mode,
        "Draft priced"
    );

    Ok(PricedDraft {
        lines,
        totals,
        commission,
        department,
    })
}

/// Keeps the stored rate of a party that holds the same role as before.
fn keep_rate(party: &mut ReferralParty, billed_id: Option<&str>, billed_rate: Option<CommissionRate>) {
    if billed_id == Some(party.id.as_str()) {
        if let Some(rate) = billed_rate {
            party.rate = rate;
        }
    }
}

/// Copies the draft, totals and commission snapshot onto an invoice.
fn apply_pricing(invoice: &mut Invoice, draft: &InvoiceDraft, priced: &PricedDraft) {
    invoice.patient_id = draft.patient_id.clone();
    invoice.doctor_id = draft.referring_doctor_id().map(str::to_string);
    invoice.introducer_id = draft.registered_introducer_id().map(str::to_string);
    invoice.introducer_raw = draft.introducer_raw;
    invoice.department = priced.department.clone();
    invoice.payment_mode = draft.payment_mode;

    invoice.total_paise = priced.totals.total.paise();
    invoice.discount_paise = priced.totals.discount.paise();
    invoice.tax_paise = priced.totals.tax.paise();
    invoice.cgst_paise = priced.totals.cgst.paise();
    invoice.sgst_paise = priced.totals.sgst.paise();
    invoice.net_paise = priced.totals.net.paise();

    let snapshot = &priced.commission.snapshot;
    invoice.commission_mode = snapshot.mode;
    (invoice.doctor_commission_type, invoice.doctor_commission_value) = rate_columns(snapshot.doctor_rate);
    (invoice.introducer_commission_type, invoice.introducer_commission_value) =
        rate_columns(snapshot.introducer_rate);
    invoice.doctor_commission_paise = priced.commission.doctor_commission.paise();
    invoice.introducer_commission_paise = priced.commission.introducer_commission.paise();
}

fn apply_payment_state(invoice: &mut Invoice, state: &PaymentState, policy: &RefundPolicy) {
    invoice.net_paise = state.net.paise();
    invoice.paid_paise = state.paid.paise();
    invoice.refund_paise = state.refunded.paise();
    invoice.balance_paise = state.balance().paise();
    invoice.payment_status = state.status(policy);
}

fn rate_columns(rate: Option<CommissionRate>) -> (Option<CommissionType>, Option<i64>) {
    match rate.map(CommissionRate::into_parts) {
        Some((kind, value)) => (Some(kind), Some(value)),
        None => (None, None),
    }
}

fn build_items(invoice_id: &str, draft: &InvoiceDraft, priced: &PricedDraft, now: DateTime<Utc>) -> Vec<InvoiceItem> {
    priced
        .lines
        .iter()
        .zip(&draft.items)
        .zip(&priced.totals.line_taxes)
        .enumerate()
        .map(|(position, ((priced_line, line), tax))| InvoiceItem {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            test_id: priced_line.test_id.clone(),
            test_name: priced_line.test_name.clone(),
            price_paise: priced_line.price.paise(),
            gst_bps: priced_line.gst.bps(),
            tax_paise: tax.paise(),
            sample_id: line
                .sample_id
                .as_deref()
                .map(str::trim)
                .filter(|sample| !sample.is_empty())
                .map(str::to_string),
            position: position as i64,
            created_at: now,
        })
        .collect()
}

fn movement(
    invoice_id: &str,
    kind: TransactionKind,
    amount: Money,
    payment_mode: Option<PaymentMode>,
    note: Option<String>,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> InvoiceTransaction {
    InvoiceTransaction {
        id: Uuid::new_v4().to_string(),
        invoice_id: invoice_id.to_string(),
        kind,
        amount_paise: amount.paise(),
        payment_mode,
        note,
        created_by: ctx.user_id.clone(),
        created_at: now,
    }
}
