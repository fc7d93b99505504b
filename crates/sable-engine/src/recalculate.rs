//! # Receipt Recalculation
//!
//! The explicit, idempotent full recompute of a receipt's persisted price
//! breakdown.
//!
//! Any mutation of a receipt's inputs - a line changed, the linked payment's
//! bill-level discount changed - must be followed by exactly one
//! [`recalculate`] call at the end of the orchestrated transaction. The
//! breakdown is always rebuilt from the current lines and configuration and
//! overwritten whole; nothing is ever patched incrementally, so stale
//! partial sums (the classic double-discount bug) cannot occur. Re-running
//! it on unchanged inputs is a no-op by construction.

use tracing::info;

use crate::error::{EngineError, EngineResult};
use sable_core::money::{Money, Rate};
use sable_core::pricing::{self, PriceBreakdown};
use sable_core::reconcile;
use sable_core::validation;
use sable_core::CoreError;
use sable_db::{ConfigRepository, Database, DbError, PaymentRepository, ReceiptRepository};

/// Recomputes and overwrites a receipt's persisted breakdown from its
/// current lines, payment discount, and active tax rules.
pub async fn recalculate(db: &Database, receipt_id: &str) -> EngineResult<PriceBreakdown> {
    let mut tx = db.pool().begin().await.map_err(DbError::from)?;
    let breakdown = recalculate_on(&mut tx, receipt_id).await?;
    tx.commit().await.map_err(DbError::from)?;
    Ok(breakdown)
}

/// Changes the payment's bill-level discount and re-runs the pipeline over
/// the receipt, all in one transaction.
pub async fn update_bill_discount(
    db: &Database,
    receipt_id: &str,
    discount: Rate,
) -> EngineResult<PriceBreakdown> {
    validation::validate_discount_rate(discount).map_err(CoreError::from)?;

    let mut tx = db.pool().begin().await.map_err(DbError::from)?;

    let payment = PaymentRepository::get_for_receipt_tx(&mut tx, receipt_id)
        .await?
        .ok_or_else(|| EngineError::ReceiptNotFound(receipt_id.to_string()))?;

    // Store the new rate first; the recompute below derives the amount and
    // the new totals from it.
    PaymentRepository::update_discount(
        &mut tx,
        &payment.id,
        discount.bps() as i64,
        0,
        payment.total_kobo,
    )
    .await?;

    let breakdown = recalculate_on(&mut tx, receipt_id).await?;
    tx.commit().await.map_err(DbError::from)?;

    info!(receipt_id = %receipt_id, discount = %discount, "Bill discount updated and receipt repriced");
    Ok(breakdown)
}

/// The shared recompute, on an open transaction.
async fn recalculate_on(
    tx: &mut sqlx::SqliteConnection,
    receipt_id: &str,
) -> EngineResult<PriceBreakdown> {
    let receipt = ReceiptRepository::get_by_id_tx(tx, receipt_id)
        .await?
        .ok_or_else(|| EngineError::ReceiptNotFound(receipt_id.to_string()))?;

    // Exactly one payment per receipt (schema-enforced); its discount is an
    // input to the pipeline.
    let payment = PaymentRepository::get_for_receipt_tx(tx, receipt_id)
        .await?
        .ok_or_else(|| EngineError::ReceiptNotFound(receipt_id.to_string()))?;

    let lines = ReceiptRepository::get_lines_tx(tx, receipt_id).await?;
    let line_totals: Vec<Money> = lines.iter().map(|l| l.total()).collect();

    let taxes = ConfigRepository::active_taxes(tx).await?;

    let breakdown = pricing::price_receipt(
        &line_totals,
        receipt.delivery_cost(),
        payment.discount_rate(),
        Money::from_kobo(receipt.loyalty_discount_kobo),
        &taxes,
    );

    ReceiptRepository::overwrite_breakdown(
        tx,
        receipt_id,
        &breakdown,
        receipt.loyalty_points_redeemed,
    )
    .await?;

    // Keep the payment totals and the balance invariant in step with the
    // (possibly changed) grand total.
    PaymentRepository::update_discount(
        tx,
        &payment.id,
        payment.discount_bps,
        breakdown.discount_amount.kobo(),
        breakdown.grand_total.kobo(),
    )
    .await?;

    let amount_paid = receipt.amount_paid();
    let balance_remaining = (breakdown.grand_total - amount_paid).floor_zero();
    let status = reconcile::receipt_status_for(amount_paid, balance_remaining);
    ReceiptRepository::update_settlement(
        tx,
        receipt_id,
        amount_paid.kobo(),
        balance_remaining.kobo(),
        status,
    )
    .await?;

    Ok(breakdown)
}
