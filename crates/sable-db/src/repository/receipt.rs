//! # Receipt Repository
//!
//! Persistence for receipts, their sale lines, and the append-only
//! partial-payment ledger.
//!
//! The price breakdown columns (subtotal, tax, tax_details, delivery,
//! loyalty fields, grand total) are only ever written by
//! [`overwrite_breakdown`](ReceiptRepository::overwrite_breakdown) - one
//! UPDATE carrying the full output of a pricing-pipeline run. There is no
//! partial-update path, so a receipt can never hold a mix of old and new
//! sums.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use sable_core::pricing::PriceBreakdown;
use sable_core::types::{PartialPayment, Receipt, ReceiptPaymentStatus, SaleLine};

const RECEIPT_COLUMNS: &str = "id, receipt_number, customer_id, cashier, subtotal_kobo, tax_kobo, \
     tax_details, delivery_kobo, loyalty_discount_kobo, loyalty_points_redeemed, grand_total_kobo, \
     amount_paid_kobo, balance_remaining_kobo, payment_status, created_at";

const LINE_COLUMNS: &str = "id, receipt_id, payment_id, kind, product_id, description, \
     unit_price_kobo, quantity, discount_kobo, total_kobo, is_gift, gift_reason, \
     original_value_kobo, created_at";

/// Repository for receipt database operations.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    /// Creates a new ReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Gets a receipt by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Receipt>> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = ?1");
        Ok(sqlx::query_as::<_, Receipt>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Gets a receipt by ID inside an open transaction.
    pub async fn get_by_id_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Receipt>> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = ?1");
        Ok(sqlx::query_as::<_, Receipt>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?)
    }

    /// Gets a receipt by its human-readable number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Receipt>> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE receipt_number = ?1");
        Ok(sqlx::query_as::<_, Receipt>(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Inserts a receipt row.
    pub async fn insert(conn: &mut SqliteConnection, receipt: &Receipt) -> DbResult<()> {
        debug!(id = %receipt.id, number = %receipt.receipt_number, "Inserting receipt");

        sqlx::query(
            "INSERT INTO receipts (
                id, receipt_number, customer_id, cashier, subtotal_kobo, tax_kobo,
                tax_details, delivery_kobo, loyalty_discount_kobo, loyalty_points_redeemed,
                grand_total_kobo, amount_paid_kobo, balance_remaining_kobo, payment_status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&receipt.id)
        .bind(&receipt.receipt_number)
        .bind(&receipt.customer_id)
        .bind(&receipt.cashier)
        .bind(receipt.subtotal_kobo)
        .bind(receipt.tax_kobo)
        .bind(&receipt.tax_details)
        .bind(receipt.delivery_kobo)
        .bind(receipt.loyalty_discount_kobo)
        .bind(receipt.loyalty_points_redeemed)
        .bind(receipt.grand_total_kobo)
        .bind(receipt.amount_paid_kobo)
        .bind(receipt.balance_remaining_kobo)
        .bind(receipt.payment_status)
        .bind(receipt.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts one sale line.
    ///
    /// Product details (description, unit price) are frozen snapshots so the
    /// sale history survives later product edits.
    pub async fn insert_line(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO sale_lines (
                id, receipt_id, payment_id, kind, product_id, description,
                unit_price_kobo, quantity, discount_kobo, total_kobo,
                is_gift, gift_reason, original_value_kobo, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(&line.id)
        .bind(&line.receipt_id)
        .bind(&line.payment_id)
        .bind(line.kind)
        .bind(&line.product_id)
        .bind(&line.description)
        .bind(line.unit_price_kobo)
        .bind(line.quantity)
        .bind(line.discount_kobo)
        .bind(line.total_kobo)
        .bind(line.is_gift)
        .bind(&line.gift_reason)
        .bind(line.original_value_kobo)
        .bind(line.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets all lines for a receipt (insertion order).
    pub async fn get_lines(&self, receipt_id: &str) -> DbResult<Vec<SaleLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines WHERE receipt_id = ?1 ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, SaleLine>(&sql)
            .bind(receipt_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Same as [`get_lines`](Self::get_lines) on an open transaction.
    pub async fn get_lines_tx(
        conn: &mut SqliteConnection,
        receipt_id: &str,
    ) -> DbResult<Vec<SaleLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines WHERE receipt_id = ?1 ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, SaleLine>(&sql)
            .bind(receipt_id)
            .fetch_all(conn)
            .await?)
    }

    /// Overwrites the receipt's persisted price breakdown in ONE write.
    ///
    /// The only writer of these columns. Always carries a complete
    /// [`PriceBreakdown`] - never a patch.
    pub async fn overwrite_breakdown(
        conn: &mut SqliteConnection,
        receipt_id: &str,
        breakdown: &PriceBreakdown,
        loyalty_points_redeemed: i64,
    ) -> DbResult<()> {
        debug!(receipt_id = %receipt_id, grand_total = %breakdown.grand_total, "Writing price breakdown");

        let result = sqlx::query(
            "UPDATE receipts SET
                subtotal_kobo = ?2,
                tax_kobo = ?3,
                tax_details = ?4,
                delivery_kobo = ?5,
                loyalty_discount_kobo = ?6,
                loyalty_points_redeemed = ?7,
                grand_total_kobo = ?8
             WHERE id = ?1",
        )
        .bind(receipt_id)
        .bind(breakdown.items_subtotal.kobo())
        .bind(breakdown.tax.total.kobo())
        .bind(breakdown.tax.breakdown_json())
        .bind(breakdown.delivery_cost.kobo())
        .bind(breakdown.loyalty_discount.kobo())
        .bind(loyalty_points_redeemed)
        .bind(breakdown.grand_total.kobo())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Receipt", receipt_id));
        }

        Ok(())
    }

    /// Updates the settlement-facing fields: amount paid, balance remaining,
    /// payment status. Callers derive all three together so the balance
    /// invariant holds after every write.
    pub async fn update_settlement(
        conn: &mut SqliteConnection,
        receipt_id: &str,
        amount_paid_kobo: i64,
        balance_remaining_kobo: i64,
        status: ReceiptPaymentStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE receipts SET
                amount_paid_kobo = ?2,
                balance_remaining_kobo = ?3,
                payment_status = ?4
             WHERE id = ?1",
        )
        .bind(receipt_id)
        .bind(amount_paid_kobo)
        .bind(balance_remaining_kobo)
        .bind(status)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Receipt", receipt_id));
        }

        Ok(())
    }

    /// Appends one partial-payment ledger row. The ledger is append-only;
    /// there is deliberately no update or delete counterpart.
    pub async fn append_partial_payment(
        conn: &mut SqliteConnection,
        entry: &PartialPayment,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO partial_payments (id, receipt_id, amount_kobo, method, received_by, note, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&entry.id)
        .bind(&entry.receipt_id)
        .bind(entry.amount_kobo)
        .bind(&entry.method)
        .bind(&entry.received_by)
        .bind(&entry.note)
        .bind(entry.paid_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Payment history for a receipt, oldest first.
    pub async fn partial_payments(&self, receipt_id: &str) -> DbResult<Vec<PartialPayment>> {
        Ok(sqlx::query_as::<_, PartialPayment>(
            "SELECT id, receipt_id, amount_kobo, method, received_by, note, paid_at
             FROM partial_payments WHERE receipt_id = ?1 ORDER BY paid_at, id",
        )
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Receipts with an outstanding balance (the debt dashboard feed).
    pub async fn outstanding(&self) -> DbResult<Vec<Receipt>> {
        let sql = format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts \
             WHERE payment_status IN ('pending', 'partial') \
             ORDER BY created_at"
        );
        Ok(sqlx::query_as::<_, Receipt>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Generates a new receipt row ID (the business number comes from the
/// sequence allocator, not from here).
pub fn generate_receipt_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale line ID.
pub fn generate_line_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new partial-payment ledger ID.
pub fn generate_partial_payment_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use sable_core::money::{Money, Rate};
    use sable_core::pricing;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn blank_receipt(id: &str, number: &str) -> Receipt {
        Receipt {
            id: id.into(),
            receipt_number: number.into(),
            customer_id: None,
            cashier: Some("ngozi".into()),
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
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        ReceiptRepository::insert(&mut conn, &blank_receipt("r1", "RCPT001/07/2025"))
            .await
            .unwrap();
        drop(conn);

        let fetched = db.receipts().get_by_id("r1").await.unwrap().unwrap();
        assert_eq!(fetched.receipt_number, "RCPT001/07/2025");
        assert_eq!(fetched.payment_status, ReceiptPaymentStatus::Pending);

        let by_number = db
            .receipts()
            .get_by_number("RCPT001/07/2025")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_number.id, "r1");
    }

    #[tokio::test]
    async fn test_overwrite_breakdown_is_complete() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        ReceiptRepository::insert(&mut conn, &blank_receipt("r1", "RCPT001/07/2025"))
            .await
            .unwrap();

        let breakdown = pricing::price_receipt(
            &[Money::from_naira(10_000)],
            Money::from_naira(1_000),
            Rate::zero(),
            Money::zero(),
            &[],
        );
        ReceiptRepository::overwrite_breakdown(&mut conn, "r1", &breakdown, 0)
            .await
            .unwrap();
        drop(conn);

        let fetched = db.receipts().get_by_id("r1").await.unwrap().unwrap();
        assert_eq!(fetched.subtotal_kobo, Money::from_naira(10_000).kobo());
        assert_eq!(fetched.delivery_kobo, Money::from_naira(1_000).kobo());
        assert_eq!(fetched.grand_total_kobo, Money::from_naira(11_000).kobo());
    }

    #[tokio::test]
    async fn test_partial_payment_ledger_is_ordered() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        ReceiptRepository::insert(&mut conn, &blank_receipt("r1", "RCPT001/07/2025"))
            .await
            .unwrap();

        for (i, amount) in [3_000i64, 7_000].iter().enumerate() {
            let entry = PartialPayment {
                id: format!("pp{i}"),
                receipt_id: "r1".into(),
                amount_kobo: Money::from_naira(*amount).kobo(),
                method: "cash".into(),
                received_by: Some("ngozi".into()),
                note: None,
                paid_at: Utc::now(),
            };
            ReceiptRepository::append_partial_payment(&mut conn, &entry)
                .await
                .unwrap();
        }
        drop(conn);

        let history = db.receipts().partial_payments("r1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount_kobo, Money::from_naira(3_000).kobo());
        assert_eq!(history[1].amount_kobo, Money::from_naira(7_000).kobo());
    }
}
