//! # Debt Settlement
//!
//! The later orchestration for receipts sold on deposit: takes further
//! payments against the outstanding balance until it reaches zero.
//!
//! Every settlement appends to the immutable partial-payment ledger, bumps
//! `amount_paid`, floors `balance_remaining` at zero, and flips
//! `payment_status` to paid once the balance is inside the reconciliation
//! tolerance. The receipt's balance invariant
//! (`amount_paid + balance_remaining == grand_total`) holds after every
//! settlement because both fields are derived together from the same read.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::request::{InstrumentRequest, SettlementOutcome};
use crate::sinks::{AuditEvent, AuditSink};
use sable_core::money::Money;
use sable_core::reconcile;
use sable_core::validation;
use sable_core::CoreError;
use sable_db::repository::receipt;
use sable_db::{Database, DbError, ReceiptRepository};
use sable_core::types::PartialPayment;

/// Cash-rounding headroom on settlements: a payment may exceed the
/// outstanding balance by up to ₦100 before it is rejected as overpayment.
pub const SETTLE_OVERPAY_TOLERANCE: Money = Money::from_naira(100);

/// Settles (part of) a receipt's outstanding balance.
///
/// Returns `ReceiptNotFound` for an unknown receipt and `Overpayment` when
/// the tendered sum exceeds balance + tolerance. Zero/negative instrument
/// amounts are rejected before anything is written.
pub async fn settle_payment(
    db: &Database,
    audit: &dyn AuditSink,
    receipt_id: &str,
    instruments: &[InstrumentRequest],
    received_by: Option<&str>,
) -> EngineResult<SettlementOutcome> {
    for instrument in instruments {
        validation::validate_method_code(&instrument.method).map_err(CoreError::from)?;
        if !instrument.amount.is_positive() {
            return Err(CoreError::Validation(
                sable_core::ValidationError::MustBePositive {
                    field: "amount".to_string(),
                },
            )
            .into());
        }
    }

    let total_payment: Money = instruments.iter().map(|i| i.amount).sum();
    if !total_payment.is_positive() {
        return Err(CoreError::Validation(sable_core::ValidationError::MustBePositive {
            field: "amount".to_string(),
        })
        .into());
    }

    let mut tx = db.pool().begin().await.map_err(DbError::from)?;

    let receipt_row = ReceiptRepository::get_by_id_tx(&mut tx, receipt_id)
        .await?
        .ok_or_else(|| EngineError::ReceiptNotFound(receipt_id.to_string()))?;

    let balance = receipt_row.balance_remaining();
    if total_payment > balance + SETTLE_OVERPAY_TOLERANCE {
        return Err(CoreError::Overpayment {
            balance_kobo: balance.kobo(),
            tendered_kobo: total_payment.kobo(),
        }
        .into());
    }

    let now = Utc::now();
    for instrument in instruments {
        let entry = PartialPayment {
            id: receipt::generate_partial_payment_id(),
            receipt_id: receipt_id.to_string(),
            amount_kobo: instrument.amount.kobo(),
            method: instrument.method.clone(),
            received_by: received_by.map(str::to_string),
            note: instrument.note.clone(),
            paid_at: now,
        };
        ReceiptRepository::append_partial_payment(&mut tx, &entry).await?;
    }

    // Derived together: paid goes up, balance floors at zero, status follows.
    let amount_paid = receipt_row.amount_paid() + total_payment;
    let balance_remaining = (balance - total_payment).floor_zero();
    let status = reconcile::receipt_status_for(amount_paid, balance_remaining);

    ReceiptRepository::update_settlement(
        &mut tx,
        receipt_id,
        amount_paid.kobo(),
        balance_remaining.kobo(),
        status,
    )
    .await?;

    tx.commit().await.map_err(DbError::from)?;

    info!(
        receipt = %receipt_row.receipt_number,
        settled = %total_payment,
        balance = %balance_remaining,
        status = ?status,
        "Settlement recorded"
    );

    let event = AuditEvent {
        actor: received_by.map(str::to_string),
        action: "payment_settle".into(),
        object_kind: "Receipt".into(),
        object_id: receipt_id.to_string(),
        summary: serde_json::json!({
            "receipt_number": receipt_row.receipt_number,
            "amount_kobo": total_payment.kobo(),
            "balance_before_kobo": balance.kobo(),
            "balance_after_kobo": balance_remaining.kobo(),
            "payment_status": status,
        }),
    };
    if let Err(err) = audit.record(&event) {
        warn!(receipt = %receipt_row.receipt_number, error = %err, "Audit sink failed");
    }

    Ok(SettlementOutcome {
        receipt_id: receipt_id.to_string(),
        receipt_number: receipt_row.receipt_number,
        amount_settled: total_payment,
        amount_paid,
        balance_remaining,
        payment_status: status,
    })
}
