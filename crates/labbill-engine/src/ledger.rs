//! # Commission Ledger Operations
//!
//! Outstanding commission per doctor or introducer, and payouts against it.
//!
//! Earned totals are never stored. Every query re-sums commission over the
//! party's invoices from their current net amount and rate snapshot, so
//! edits and refunds are reflected without bookkeeping:
//!
//! ```text
//! outstanding = Σ earned_on(invoice)   (REFUNDED invoices earn 0)
//!             − Σ payout.amount
//! ```

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use labbill_core::command::RecordPayoutCommand;
use labbill_core::ledger::CommissionLedger;
use labbill_core::validation::validate_required_id;
use labbill_core::{Doctor, Payout};
use labbill_db::DbError;

use crate::engine::{BillingEngine, RequestContext};
use crate::error::{EngineError, EngineResult};

impl BillingEngine {
    /// Earned, paid and outstanding commission for a doctor or introducer.
    ///
    /// Reads invoices and payouts from one snapshot, so repeated calls with
    /// no mutation in between return the same ledger.
    pub async fn get_outstanding(&self, ctx: &RequestContext, doctor_id: &str) -> EngineResult<CommissionLedger> {
        self.bounded("get_outstanding", async {
            ctx.validate()?;
            self.load_doctor(ctx, doctor_id).await?;

            let mut tx = self.db.begin().await?;
            let invoices = self
                .db
                .invoices()
                .for_party_in(&mut tx, &ctx.tenant_id, doctor_id)
                .await?;
            let payouts = self
                .db
                .payouts()
                .for_doctor_in(&mut tx, &ctx.tenant_id, doctor_id)
                .await?;
            tx.commit().await.map_err(DbError::from)?;

            Ok::<_, EngineError>(CommissionLedger::compute(doctor_id, &invoices, &payouts))
        })
        .await
    }

    /// Pays out commission. Payouts for the same doctor serialize on the
    /// doctor row, so two payouts can never both spend the same outstanding
    /// amount.
    ///
    /// ## Errors
    /// - `NOT_FOUND` for an unknown doctor
    /// - `VALIDATION` when the amount is not positive
    /// - `CONSISTENCY` when the amount exceeds the outstanding balance
    pub async fn record_payout(
        &self,
        ctx: &RequestContext,
        doctor_id: &str,
        command: RecordPayoutCommand,
    ) -> EngineResult<Payout> {
        self.bounded("record_payout", async {
            ctx.validate()?;
            validate_required_id("doctor_id", doctor_id)?;
            command.validate()?;

            let payouts = self.db.payouts();

            let mut tx = self.db.begin().await?;
            self.db
                .registry()
                .lock_doctor_in(&mut tx, &ctx.tenant_id, doctor_id)
                .await?;

            let invoices = self
                .db
                .invoices()
                .for_party_in(&mut tx, &ctx.tenant_id, doctor_id)
                .await?;
            let history = payouts.for_doctor_in(&mut tx, &ctx.tenant_id, doctor_id).await?;

            let ledger = CommissionLedger::compute(doctor_id, &invoices, &history);
            ledger.check_payout(command.amount)?;

            let payout = Payout {
                id: Uuid::new_v4().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                doctor_id: doctor_id.to_string(),
                amount_paise: command.amount.paise(),
                payment_date: command.payment_date,
                payment_mode: command.payment_mode,
                reference_number: trimmed(command.reference_number),
                notes: trimmed(command.notes),
                created_by: ctx.user_id.clone(),
                created_at: Utc::now(),
            };
            payouts.insert_in(&mut tx, &payout).await?;

            self.audit_in(&mut tx, ctx, "payout.create", ("payout", &payout.id), None, Some(&payout))
                .await?;
            tx.commit().await.map_err(DbError::from)?;

            info!(
                payout_id = %payout.id,
                doctor_id = %doctor_id,
                amount = %command.amount,
                outstanding = %(ledger.outstanding - command.amount),
                "Payout recorded"
            );

            Ok::<_, EngineError>(payout)
        })
        .await
    }

    /// Payout history for a doctor or introducer, newest first.
    pub async fn list_payouts(&self, ctx: &RequestContext, doctor_id: &str) -> EngineResult<Vec<Payout>> {
        self.bounded("list_payouts", async {
            ctx.validate()?;
            self.load_doctor(ctx, doctor_id).await?;

            Ok::<_, EngineError>(self.db.payouts().for_doctor(&ctx.tenant_id, doctor_id).await?)
        })
        .await
    }

    async fn load_doctor(&self, ctx: &RequestContext, doctor_id: &str) -> EngineResult<Doctor> {
        validate_required_id("doctor_id", doctor_id)?;

        self.db
            .registry()
            .get_doctor(&ctx.tenant_id, doctor_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Doctor", doctor_id))
    }
}

fn trimmed(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
