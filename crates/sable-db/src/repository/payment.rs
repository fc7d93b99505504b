//! # Payment Repository
//!
//! Persistence for the payment container and its tendered instruments.
//!
//! One payment per receipt (UNIQUE constraint). `total_paid` is always the
//! SUM of completed instruments re-read from the database - never an
//! application-side accumulation - and `status` is derived from that sum in
//! the same update.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use sable_core::types::{Payment, PaymentInstrument, PaymentStatus};

const PAYMENT_COLUMNS: &str = "id, receipt_id, status, total_kobo, total_paid_kobo, \
     balance_due_kobo, discount_bps, discount_kobo, loyalty_discount_kobo, created_at, completed_at";

const INSTRUMENT_COLUMNS: &str = "id, payment_id, method, amount_kobo, status, reference, note, \
     processed_at, confirmed_at";

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Inserts a payment row.
    pub async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        debug!(id = %payment.id, receipt_id = %payment.receipt_id, "Inserting payment");

        sqlx::query(
            "INSERT INTO payments (
                id, receipt_id, status, total_kobo, total_paid_kobo, balance_due_kobo,
                discount_bps, discount_kobo, loyalty_discount_kobo, created_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&payment.id)
        .bind(&payment.receipt_id)
        .bind(payment.status)
        .bind(payment.total_kobo)
        .bind(payment.total_paid_kobo)
        .bind(payment.balance_due_kobo)
        .bind(payment.discount_bps)
        .bind(payment.discount_kobo)
        .bind(payment.loyalty_discount_kobo)
        .bind(payment.created_at)
        .bind(payment.completed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// The payment for a receipt (exactly one when it exists).
    pub async fn get_for_receipt(&self, receipt_id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE receipt_id = ?1");
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(receipt_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Same as [`get_for_receipt`](Self::get_for_receipt) on an open
    /// transaction.
    pub async fn get_for_receipt_tx(
        conn: &mut SqliteConnection,
        receipt_id: &str,
    ) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE receipt_id = ?1");
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(receipt_id)
            .fetch_optional(conn)
            .await?)
    }

    /// Records one tendered instrument.
    pub async fn insert_instrument(
        conn: &mut SqliteConnection,
        instrument: &PaymentInstrument,
    ) -> DbResult<()> {
        debug!(
            payment_id = %instrument.payment_id,
            method = %instrument.method,
            amount = %instrument.amount_kobo,
            "Recording payment instrument"
        );

        sqlx::query(
            "INSERT INTO payment_instruments (
                id, payment_id, method, amount_kobo, status, reference, note,
                processed_at, confirmed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&instrument.id)
        .bind(&instrument.payment_id)
        .bind(&instrument.method)
        .bind(instrument.amount_kobo)
        .bind(instrument.status)
        .bind(&instrument.reference)
        .bind(&instrument.note)
        .bind(instrument.processed_at)
        .bind(instrument.confirmed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// All instruments for a payment, oldest first.
    pub async fn instruments(&self, payment_id: &str) -> DbResult<Vec<PaymentInstrument>> {
        let sql = format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM payment_instruments \
             WHERE payment_id = ?1 ORDER BY processed_at, id"
        );
        Ok(sqlx::query_as::<_, PaymentInstrument>(&sql)
            .bind(payment_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Sum of COMPLETED instruments, re-read from the database.
    pub async fn completed_total(
        conn: &mut SqliteConnection,
        payment_id: &str,
    ) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(amount_kobo) FROM payment_instruments \
             WHERE payment_id = ?1 AND status = 'completed'",
        )
        .bind(payment_id)
        .fetch_one(conn)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Writes the derived aggregate fields: total paid, balance due, status,
    /// completion timestamp. All four move together.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        payment_id: &str,
        total_paid_kobo: i64,
        balance_due_kobo: i64,
        status: PaymentStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE payments SET
                total_paid_kobo = ?2,
                balance_due_kobo = ?3,
                status = ?4,
                completed_at = ?5
             WHERE id = ?1",
        )
        .bind(payment_id)
        .bind(total_paid_kobo)
        .bind(balance_due_kobo)
        .bind(status)
        .bind(completed_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", payment_id));
        }

        Ok(())
    }

    /// Updates the bill-level discount. The caller must re-run the pricing
    /// pipeline afterwards; this only stores the new inputs and totals.
    pub async fn update_discount(
        conn: &mut SqliteConnection,
        payment_id: &str,
        discount_bps: i64,
        discount_kobo: i64,
        total_kobo: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE payments SET
                discount_bps = ?2,
                discount_kobo = ?3,
                total_kobo = ?4
             WHERE id = ?1",
        )
        .bind(payment_id)
        .bind(discount_bps)
        .bind(discount_kobo)
        .bind(total_kobo)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", payment_id));
        }

        Ok(())
    }
}

/// Generates a new payment ID.
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new instrument ID.
pub fn generate_instrument_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::receipt::ReceiptRepository;
    use sable_core::types::{InstrumentStatus, Receipt, ReceiptPaymentStatus};

    async fn db_with_receipt() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let receipt = Receipt {
            id: "r1".into(),
            receipt_number: "RCPT001/07/2025".into(),
            customer_id: None,
            cashier: None,
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
            created_at: Utc::now(),
        };
        ReceiptRepository::insert(&mut conn, &receipt).await.unwrap();
        db
    }

    fn payment(id: &str) -> Payment {
        Payment {
            id: id.into(),
            receipt_id: "r1".into(),
            status: PaymentStatus::Pending,
            total_kobo: 1_000_000,
            total_paid_kobo: 0,
            balance_due_kobo: 1_000_000,
            discount_bps: 0,
            discount_kobo: 0,
            loyalty_discount_kobo: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn instrument(id: &str, payment_id: &str, amount: i64, status: InstrumentStatus) -> PaymentInstrument {
        PaymentInstrument {
            id: id.into(),
            payment_id: payment_id.into(),
            method: "cash".into(),
            amount_kobo: amount,
            status,
            reference: None,
            note: None,
            processed_at: Utc::now(),
            confirmed_at: None,
        }
    }

    #[tokio::test]
    async fn test_completed_total_only_counts_completed() {
        let db = db_with_receipt().await;
        let mut conn = db.pool().acquire().await.unwrap();

        PaymentRepository::insert(&mut conn, &payment("p1")).await.unwrap();
        PaymentRepository::insert_instrument(
            &mut conn,
            &instrument("i1", "p1", 600_000, InstrumentStatus::Completed),
        )
        .await
        .unwrap();
        PaymentRepository::insert_instrument(
            &mut conn,
            &instrument("i2", "p1", 400_000, InstrumentStatus::Completed),
        )
        .await
        .unwrap();
        PaymentRepository::insert_instrument(
            &mut conn,
            &instrument("i3", "p1", 999_999, InstrumentStatus::Cancelled),
        )
        .await
        .unwrap();

        let total = PaymentRepository::completed_total(&mut conn, "p1").await.unwrap();
        assert_eq!(total, 1_000_000);
    }

    #[tokio::test]
    async fn test_one_payment_per_receipt_enforced() {
        let db = db_with_receipt().await;
        let mut conn = db.pool().acquire().await.unwrap();

        PaymentRepository::insert(&mut conn, &payment("p1")).await.unwrap();
        let err = PaymentRepository::insert(&mut conn, &payment("p2")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_instrument_amount_must_be_positive() {
        let db = db_with_receipt().await;
        let mut conn = db.pool().acquire().await.unwrap();

        PaymentRepository::insert(&mut conn, &payment("p1")).await.unwrap();
        let err = PaymentRepository::insert_instrument(
            &mut conn,
            &instrument("i1", "p1", 0, InstrumentStatus::Completed),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
