//! # Checkout Orchestration
//!
//! The top-level use case: turns a cart of line items into the durable
//! Receipt / SaleLine / Payment / Instrument / Loyalty graph, inside ONE
//! atomic unit of work.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Validating          request shape, advisory stock check (may be       │
//! │      │               stale - cheap early rejection with a precise      │
//! │      ▼               line error)                                       │
//! │  StockReserved       atomic conditional decrement per product line,    │
//! │      │               against the LIVE quantity; any line short         │
//! │      ▼               aborts everything                                 │
//! │  Priced              pricing pipeline (tax + loyalty inside)           │
//! │      │                                                                 │
//! │      ▼                                                                 │
//! │  PaymentReconciled   instruments vs the now-final grand total,         │
//! │      │               deposit mode honored, store credit consumed FIFO  │
//! │      ▼                                                                 │
//! │  Committed           receipt number minted, full graph persisted,      │
//! │                      transaction committed, THEN fire-and-forget       │
//! │                      notification + audit sinks                        │
//! │                                                                         │
//! │  Aborted is reachable from every state: the transaction is dropped     │
//! │  and SQLite rolls back every partial write, including the stock        │
//! │  decrements and the allocated number.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A transient conflict (`EngineError::Conflict`) means the WHOLE checkout
//! is retried from the top - never a sub-step - which
//! [`CheckoutService::process_with_retry`] automates.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::EngineResult;
use crate::request::{CheckoutReceipt, CheckoutRequest, InstrumentSummary, LineRequest};
use crate::sinks::{AuditEvent, AuditSink, LogSink, NotificationSink, ReceiptReady};
use sable_core::loyalty::{self, AccrualRule, CounterReset, LoyaltyProgram};
use sable_core::money::Money;
use sable_core::pricing::{self, PriceBreakdown};
use sable_core::reconcile::{
    self, InstrumentDraft, InstrumentKind, ReconcileOutcome, SettlementMode,
};
use sable_core::sequence::SequenceKind;
use sable_core::types::{
    InstrumentStatus, LineKind, LoyaltyAccount, PartialPayment, Payment, PaymentInstrument,
    PaymentStatus, Receipt, ReceiptPaymentStatus, SaleLine,
};
use sable_core::validation;
use sable_core::CoreError;
use sable_db::repository::{payment, receipt, sequence};
use sable_db::{
    ConfigRepository, CreditConsumption, Database, DbError, LoyaltyRepository, PaymentRepository,
    ReceiptRepository, StockDecrement, StockRepository, StoreCreditRepository,
};

/// A priced, stock-checked line ready to persist.
#[derive(Debug, Clone)]
struct LineDraft {
    kind: LineKind,
    product_id: Option<String>,
    description: String,
    unit_price: Money,
    quantity: i64,
    discount: Money,
    total: Money,
    is_gift: bool,
    gift_reason: Option<String>,
    original_value: Option<Money>,
}

/// The checkout use case. One instance per process; cheap to clone.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
}

impl CheckoutService {
    /// Creates a service with the default log-backed sinks.
    pub fn new(db: Database) -> Self {
        CheckoutService {
            db,
            notifications: Arc::new(LogSink),
            audit: Arc::new(LogSink),
        }
    }

    /// Creates a service with explicit sink implementations.
    pub fn with_sinks(
        db: Database,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        CheckoutService {
            db,
            notifications,
            audit,
        }
    }

    /// Runs one checkout to completion, retrying the whole transaction on
    /// transient conflicts (bounded attempts).
    pub async fn process_with_retry(
        &self,
        request: &CheckoutRequest,
        max_attempts: u32,
    ) -> EngineResult<CheckoutReceipt> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.process(request).await {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(attempt, error = %err, "Transient conflict; retrying checkout from the top");
                }
                other => return other,
            }
        }
    }

    /// Runs one checkout inside one atomic transaction.
    pub async fn process(&self, request: &CheckoutRequest) -> EngineResult<CheckoutReceipt> {
        // ---- Validating (request shape; no I/O yet) -------------------------
        validate_request(request)?;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        // Reference data, loaded once for the whole transaction.
        let allowlist = ConfigRepository::payment_method_allowlist(&mut tx).await?;
        let taxes = ConfigRepository::active_taxes(&mut tx).await?;
        let program = ConfigRepository::active_loyalty_program(&mut tx).await?;

        let instruments = resolve_instruments(request, &allowlist)?;

        // ---- Validating (advisory stock) + StockReserved --------------------
        // The advisory read produces precise errors against a possibly stale
        // quantity; the conditional decrement right after is what actually
        // guarantees stock never goes negative.
        let drafts = build_line_drafts(&mut tx, request).await?;
        reserve_stock(&mut tx, &drafts).await?;

        // ---- Priced ---------------------------------------------------------
        let mut account = match (&program, &request.customer_id) {
            (Some(_), Some(customer_id)) => {
                Some(LoyaltyRepository::get_or_create(&mut tx, customer_id).await?)
            }
            _ => None,
        };

        // A count-threshold discount, when earned, competes with the manual
        // bill discount; the better of the two applies.
        let mut bill_discount = request.bill_discount;
        let mut count_reset: Option<CounterReset> = None;
        if let (Some(program), Some(acct)) = (&program, &account) {
            if let Some(hit) = loyalty::count_discount(program, acct) {
                if hit.discount > bill_discount {
                    debug!(discount = %hit.discount, "Applying count-threshold discount");
                    bill_discount = hit.discount;
                    count_reset = Some(hit.reset);
                }
            }
        }

        let line_totals: Vec<Money> = drafts.iter().map(|d| d.total).collect();
        let base = pricing::price_receipt(
            &line_totals,
            request.delivery_cost,
            bill_discount,
            Money::zero(),
            &taxes,
        );
        // Points accrue on the pre-redemption grand total, so spending
        // points does not shrink what the customer earns.
        let accrual_base = base.grand_total;

        let (breakdown, points_redeemed, redeemed_value) =
            apply_redemption(request, &program, &account, &base, &line_totals, &taxes);

        // ---- PaymentReconciled ----------------------------------------------
        let mode = if request.partial_payment {
            SettlementMode::Deposit
        } else {
            SettlementMode::Full
        };
        let outcome = reconcile::reconcile(breakdown.grand_total, &instruments, mode)?;

        // ---- Committed ------------------------------------------------------
        let now = Utc::now();
        let receipt_number = sequence::next_number(&mut tx, SequenceKind::Receipt, now).await?;
        let receipt_id = receipt::generate_receipt_id();
        let payment_id = payment::generate_payment_id();

        let (amount_paid, balance_remaining, receipt_status) = outcome.receipt_fields();

        let receipt_row = Receipt {
            id: receipt_id.clone(),
            receipt_number: receipt_number.clone(),
            customer_id: request.customer_id.clone(),
            cashier: request.cashier.clone(),
            subtotal_kobo: 0,
            tax_kobo: 0,
            tax_details: "{}".into(),
            delivery_kobo: 0,
            loyalty_discount_kobo: 0,
            loyalty_points_redeemed: 0,
            grand_total_kobo: 0,
            amount_paid_kobo: 0,
            balance_remaining_kobo: 0,
            payment_status: ReceiptPaymentStatus::Pending,
            created_at: now,
        };
        ReceiptRepository::insert(&mut tx, &receipt_row).await?;

        let payment_row = Payment {
            id: payment_id.clone(),
            receipt_id: receipt_id.clone(),
            status: PaymentStatus::Pending,
            total_kobo: breakdown.grand_total.kobo(),
            total_paid_kobo: 0,
            balance_due_kobo: breakdown.grand_total.kobo(),
            discount_bps: bill_discount.bps() as i64,
            discount_kobo: breakdown.discount_amount.kobo(),
            loyalty_discount_kobo: breakdown.loyalty_discount.kobo(),
            created_at: now,
            completed_at: None,
        };
        PaymentRepository::insert(&mut tx, &payment_row).await?;

        let lines = persist_lines(&mut tx, &drafts, &receipt_id, &payment_id, now).await?;

        persist_instruments(
            &mut tx,
            request,
            &instruments,
            &payment_id,
            &receipt_id,
            now,
        )
        .await?;

        // The breakdown lands in one write; the settlement fields in another,
        // derived together so the balance invariant holds.
        ReceiptRepository::overwrite_breakdown(&mut tx, &receipt_id, &breakdown, points_redeemed)
            .await?;
        ReceiptRepository::update_settlement(
            &mut tx,
            &receipt_id,
            amount_paid.kobo(),
            balance_remaining.kobo(),
            receipt_status,
        )
        .await?;

        // Payment aggregates re-read from completed instrument rows.
        let total_paid = PaymentRepository::completed_total(&mut tx, &payment_id).await?;
        let payment_status =
            reconcile::payment_status_for(Money::from_kobo(total_paid), breakdown.grand_total);
        let completed_at = matches!(payment_status, PaymentStatus::Completed).then_some(now);
        PaymentRepository::update_status(
            &mut tx,
            &payment_id,
            total_paid,
            (breakdown.grand_total.kobo() - total_paid).max(0),
            payment_status,
            completed_at,
        )
        .await?;

        // Deposits leave an append-only ledger trail, one row per instrument.
        if let ReconcileOutcome::Deposit { paid, balance } = outcome {
            for instrument in &instruments {
                let entry = PartialPayment {
                    id: receipt::generate_partial_payment_id(),
                    receipt_id: receipt_id.clone(),
                    amount_kobo: instrument.amount.kobo(),
                    method: instrument.kind.code().to_string(),
                    received_by: request.cashier.clone(),
                    note: Some(format!("Initial deposit {paid}, balance {balance}")),
                    paid_at: now,
                };
                ReceiptRepository::append_partial_payment(&mut tx, &entry).await?;
            }
        }

        let points_earned = apply_loyalty_effects(
            &mut tx,
            &program,
            &mut account,
            &drafts,
            accrual_base,
            points_redeemed,
            redeemed_value,
            count_reset,
            &receipt_id,
            &receipt_number,
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            receipt = %receipt_number,
            total = %breakdown.grand_total,
            status = ?receipt_status,
            lines = lines.len(),
            "Checkout committed"
        );

        // ---- Post-commit side effects (fire-and-forget) ---------------------
        let summaries: Vec<InstrumentSummary> = instruments
            .iter()
            .map(|i| InstrumentSummary {
                method: i.kind.code().to_string(),
                amount: i.amount,
                reference: i.reference.clone(),
            })
            .collect();
        self.dispatch_side_effects(
            &receipt_id,
            &receipt_number,
            request,
            &breakdown,
            &lines,
            &summaries,
            receipt_status,
        )
        .await;

        Ok(CheckoutReceipt {
            receipt_id,
            receipt_number,
            subtotal: breakdown.items_subtotal,
            delivery_cost: breakdown.delivery_cost,
            discount_amount: breakdown.discount_amount,
            loyalty_discount: breakdown.loyalty_discount,
            tax_total: breakdown.tax.total,
            grand_total: breakdown.grand_total,
            amount_paid,
            balance_remaining,
            payment_status: receipt_status,
            instruments: summaries,
            points_earned,
            points_redeemed,
        })
    }

    /// Notifies the external collaborators. Failures are warnings; the
    /// committed transaction is already durable.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_side_effects(
        &self,
        receipt_id: &str,
        receipt_number: &str,
        request: &CheckoutRequest,
        breakdown: &PriceBreakdown,
        lines: &[SaleLine],
        instruments: &[InstrumentSummary],
        status: ReceiptPaymentStatus,
    ) {
        let receipt = match self.db.receipts().get_by_id(receipt_id).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) | Err(_) => {
                warn!(receipt = %receipt_number, "Committed receipt unreadable for notification");
                return;
            }
        };

        let ready = ReceiptReady {
            receipt,
            lines: lines.to_vec(),
            instruments: instruments.to_vec(),
        };
        if let Err(err) = self.notifications.receipt_ready(&ready) {
            warn!(receipt = %receipt_number, error = %err, "Notification sink failed");
        }

        let event = AuditEvent {
            actor: request.cashier.clone(),
            action: "sale_create".into(),
            object_kind: "Receipt".into(),
            object_id: receipt_id.to_string(),
            summary: serde_json::json!({
                "receipt_number": receipt_number,
                "grand_total_kobo": breakdown.grand_total.kobo(),
                "tax_kobo": breakdown.tax.total.kobo(),
                "discount_kobo": breakdown.discount_amount.kobo(),
                "loyalty_discount_kobo": breakdown.loyalty_discount.kobo(),
                "lines": lines.len(),
                "payment_status": status,
            }),
        };
        if let Err(err) = self.audit.record(&event) {
            warn!(receipt = %receipt_number, error = %err, "Audit sink failed");
        }
    }
}

// =============================================================================
// Checkout Steps
// =============================================================================

fn validate_request(request: &CheckoutRequest) -> EngineResult<()> {
    validation::validate_line_count(request.lines.len()).map_err(CoreError::from)?;
    validation::validate_non_negative("delivery_cost", request.delivery_cost)
        .map_err(CoreError::from)?;
    validation::validate_discount_rate(request.bill_discount).map_err(CoreError::from)?;

    for line in &request.lines {
        match line {
            LineRequest::Product {
                quantity, discount, ..
            } => {
                validation::validate_quantity(*quantity).map_err(CoreError::from)?;
                validation::validate_non_negative("discount", *discount)
                    .map_err(CoreError::from)?;
            }
            LineRequest::ServiceCharge { amount, .. } => {
                validation::validate_non_negative("amount", *amount).map_err(CoreError::from)?;
            }
        }
    }

    for instrument in &request.instruments {
        validation::validate_method_code(&instrument.method).map_err(CoreError::from)?;
    }

    Ok(())
}

/// Resolves instrument codes against the built-ins + allow-list, and checks
/// store-credit instruments have a customer to debit.
fn resolve_instruments(
    request: &CheckoutRequest,
    allowlist: &[String],
) -> EngineResult<Vec<InstrumentDraft>> {
    let mut drafts = Vec::with_capacity(request.instruments.len());
    for instrument in &request.instruments {
        let kind = InstrumentKind::from_code(&instrument.method, allowlist)?;
        if kind.is_store_credit() && request.customer_id.is_none() {
            return Err(CoreError::CustomerRequiredForStoreCredit.into());
        }
        drafts.push(InstrumentDraft {
            kind,
            amount: instrument.amount,
            reference: instrument.reference.clone(),
            note: instrument.note.clone(),
        });
    }
    Ok(drafts)
}

/// Loads product snapshots and prices every line. Advisory stock check only;
/// the authoritative check is the conditional decrement.
async fn build_line_drafts(
    tx: &mut sqlx::SqliteConnection,
    request: &CheckoutRequest,
) -> EngineResult<Vec<LineDraft>> {
    let mut drafts = Vec::with_capacity(request.lines.len());

    for (index, line) in request.lines.iter().enumerate() {
        match line {
            LineRequest::Product {
                product_id,
                quantity,
                discount,
                is_gift,
                gift_reason,
            } => {
                let product = StockRepository::get_by_id_tx(tx, product_id)
                    .await?
                    .filter(|p| p.is_active)
                    .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

                if product.quantity < *quantity {
                    return Err(CoreError::InsufficientStock {
                        line: index,
                        product_id: product.id.clone(),
                        brand: product.brand.clone(),
                        available: product.quantity,
                        requested: *quantity,
                    }
                    .into());
                }

                let priced =
                    pricing::line_total(product.selling_price(), *quantity, *discount, *is_gift);
                drafts.push(LineDraft {
                    kind: LineKind::Product,
                    product_id: Some(product.id.clone()),
                    description: product.brand.clone(),
                    unit_price: product.selling_price(),
                    quantity: *quantity,
                    discount: priced.discount,
                    total: priced.total,
                    is_gift: *is_gift,
                    gift_reason: gift_reason.clone(),
                    original_value: priced.original_value,
                });
            }
            LineRequest::ServiceCharge {
                description,
                amount,
            } => {
                drafts.push(LineDraft {
                    kind: LineKind::Service,
                    product_id: None,
                    description: description.clone(),
                    unit_price: *amount,
                    quantity: 1,
                    discount: Money::zero(),
                    total: *amount,
                    is_gift: false,
                    gift_reason: None,
                    original_value: None,
                });
            }
        }
    }

    Ok(drafts)
}

/// Atomically commits every product line's stock decrement. Gift lines
/// decrement too - they just ring up at zero.
async fn reserve_stock(
    tx: &mut sqlx::SqliteConnection,
    drafts: &[LineDraft],
) -> EngineResult<()> {
    for (index, draft) in drafts.iter().enumerate() {
        let Some(product_id) = &draft.product_id else {
            continue;
        };
        match StockRepository::try_decrement(tx, product_id, draft.quantity).await? {
            StockDecrement::Applied => {}
            StockDecrement::Insufficient { available } => {
                return Err(CoreError::InsufficientStock {
                    line: index,
                    product_id: product_id.clone(),
                    brand: draft.description.clone(),
                    available,
                    requested: draft.quantity,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Validates and applies a requested point redemption. A rejected redemption
/// rolls the discount back to zero and the sale proceeds (the rejection is
/// logged, the balance untouched).
fn apply_redemption(
    request: &CheckoutRequest,
    program: &Option<LoyaltyProgram>,
    account: &Option<LoyaltyAccount>,
    base: &PriceBreakdown,
    line_totals: &[Money],
    taxes: &[sable_core::tax::TaxRule],
) -> (PriceBreakdown, i64, Money) {
    if request.redeem_points <= 0 {
        return (base.clone(), 0, Money::zero());
    }

    let (Some(program), Some(account)) = (program, account) else {
        warn!("Point redemption requested without an active program or customer; ignored");
        return (base.clone(), 0, Money::zero());
    };

    match loyalty::validate_redemption(
        program,
        account.current_balance,
        request.redeem_points,
        base.grand_total,
    ) {
        Ok(discount) => {
            let repriced = pricing::price_receipt(
                line_totals,
                request.delivery_cost,
                base.bill_discount,
                discount,
                taxes,
            );
            (repriced, request.redeem_points, discount)
        }
        Err(err) => {
            warn!(error = %err, points = request.redeem_points, "Redemption rejected; selling without loyalty discount");
            (base.clone(), 0, Money::zero())
        }
    }
}

async fn persist_lines(
    tx: &mut sqlx::SqliteConnection,
    drafts: &[LineDraft],
    receipt_id: &str,
    payment_id: &str,
    now: chrono::DateTime<Utc>,
) -> EngineResult<Vec<SaleLine>> {
    let mut lines = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let line = SaleLine {
            id: receipt::generate_line_id(),
            receipt_id: receipt_id.to_string(),
            payment_id: payment_id.to_string(),
            kind: draft.kind,
            product_id: draft.product_id.clone(),
            description: draft.description.clone(),
            unit_price_kobo: draft.unit_price.kobo(),
            quantity: draft.quantity,
            discount_kobo: draft.discount.kobo(),
            total_kobo: draft.total.kobo(),
            is_gift: draft.is_gift,
            gift_reason: draft.gift_reason.clone(),
            original_value_kobo: draft.original_value.map(|v| v.kobo()),
            created_at: now,
        };
        ReceiptRepository::insert_line(tx, &line).await?;
        lines.push(line);
    }
    Ok(lines)
}

/// Records every tendered instrument as completed, consuming store credit
/// FIFO where applicable.
async fn persist_instruments(
    tx: &mut sqlx::SqliteConnection,
    request: &CheckoutRequest,
    instruments: &[InstrumentDraft],
    payment_id: &str,
    receipt_id: &str,
    now: chrono::DateTime<Utc>,
) -> EngineResult<()> {
    for instrument in instruments {
        if instrument.kind.is_store_credit() {
            // resolve_instruments already required a customer
            let customer_id = request
                .customer_id
                .as_deref()
                .ok_or(CoreError::CustomerRequiredForStoreCredit)?;

            match StoreCreditRepository::consume_fifo(
                tx,
                customer_id,
                instrument.amount.kobo(),
                receipt_id,
            )
            .await?
            {
                CreditConsumption::Applied { usages } => {
                    debug!(count = usages.len(), "Store credit consumed FIFO");
                }
                CreditConsumption::Insufficient { available_kobo } => {
                    return Err(CoreError::InsufficientStoreCredit {
                        available_kobo,
                        requested_kobo: instrument.amount.kobo(),
                    }
                    .into());
                }
            }
        }

        let row = PaymentInstrument {
            id: payment::generate_instrument_id(),
            payment_id: payment_id.to_string(),
            method: instrument.kind.code().to_string(),
            amount_kobo: instrument.amount.kobo(),
            status: InstrumentStatus::Completed,
            reference: instrument.reference.clone(),
            note: instrument.note.clone(),
            processed_at: now,
            confirmed_at: Some(now),
        };
        PaymentRepository::insert_instrument(tx, &row).await?;
    }

    Ok(())
}

/// Applies accrual, redemption, and count-threshold counter updates, each
/// paired with its ledger row. Returns the points earned.
#[allow(clippy::too_many_arguments)]
async fn apply_loyalty_effects(
    tx: &mut sqlx::SqliteConnection,
    program: &Option<LoyaltyProgram>,
    account: &mut Option<LoyaltyAccount>,
    drafts: &[LineDraft],
    accrual_base: Money,
    points_redeemed: i64,
    redeemed_value: Money,
    count_reset: Option<CounterReset>,
    receipt_id: &str,
    receipt_number: &str,
) -> EngineResult<i64> {
    let (Some(program), Some(account)) = (program, account.as_mut()) else {
        return Ok(0);
    };
    if !program.is_active || !account.is_active {
        return Ok(0);
    }

    let mut points_earned = 0;
    match program.rule {
        AccrualRule::PerTransaction { .. }
        | AccrualRule::PerAmount { .. }
        | AccrualRule::Combined { .. } => {
            if points_redeemed > 0 {
                LoyaltyRepository::redeem(
                    tx,
                    &account.id,
                    points_redeemed,
                    redeemed_value.kobo(),
                    Some(receipt_id),
                    &format!("Redeemed for discount - Receipt {receipt_number}"),
                )
                .await?;
            }

            points_earned = loyalty::points_earned(program, accrual_base);
            if points_earned > 0 {
                LoyaltyRepository::accrue(
                    tx,
                    &account.id,
                    points_earned,
                    Some(accrual_base.kobo()),
                    Some(receipt_id),
                    &format!("Purchase - Receipt {receipt_number}"),
                )
                .await?;
            }
        }
        AccrualRule::TransactionCount { .. } => {
            if let Some(reset) = count_reset {
                LoyaltyRepository::apply_count_reset(tx, &account.id, reset).await?;
            }
            LoyaltyRepository::bump_counters(tx, &account.id, 1, 0).await?;
        }
        AccrualRule::ItemCount { .. } => {
            if let Some(reset) = count_reset {
                LoyaltyRepository::apply_count_reset(tx, &account.id, reset).await?;
            }
            let items: i64 = drafts
                .iter()
                .filter(|d| d.kind == LineKind::Product)
                .map(|d| d.quantity)
                .sum();
            LoyaltyRepository::bump_counters(tx, &account.id, 0, items).await?;
        }
    }

    Ok(points_earned)
}
