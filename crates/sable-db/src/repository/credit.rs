//! # Store Credit Repository
//!
//! Issues store credits and consumes them oldest-first (FIFO) when a
//! "store_credit" instrument is tendered.
//!
//! ## FIFO Consumption
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Customer pays ₦4,000 by store credit and holds:                        │
//! │    SC001 issued Jan, remaining ₦1,500                                   │
//! │    SC005 issued Mar, remaining ₦3,000                                   │
//! │                                                                         │
//! │  Consumption walks oldest-first:                                        │
//! │    SC001 → use ₦1,500 (exhausted, deactivated)                          │
//! │    SC005 → use ₦2,500 (₦500 left)                                       │
//! │                                                                         │
//! │  Each deduction writes one immutable store_credit_usages row. If the   │
//! │  pool is short the WHOLE reconciliation fails - no partial use.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::sequence;
use sable_core::sequence::SequenceKind;
use sable_core::types::{StoreCredit, StoreCreditUsage};

const CREDIT_COLUMNS: &str =
    "id, credit_number, customer_id, original_kobo, remaining_kobo, is_active, issued_at, note";

/// Result of attempting to consume store credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditConsumption {
    /// The full amount was covered; one usage row per credit touched.
    Applied { usages: Vec<StoreCreditUsage> },
    /// Pool too small; nothing was consumed.
    Insufficient { available_kobo: i64 },
}

/// Repository for store credit operations.
#[derive(Debug, Clone)]
pub struct StoreCreditRepository {
    pool: SqlitePool,
}

impl StoreCreditRepository {
    /// Creates a new StoreCreditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StoreCreditRepository { pool }
    }

    /// Issues a new credit, allocating its `SC###/MM/YYYY` number.
    pub async fn issue(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount_kobo: i64,
        note: Option<&str>,
    ) -> DbResult<StoreCredit> {
        let now = Utc::now();
        let credit_number = sequence::next_number(conn, SequenceKind::StoreCredit, now).await?;

        let credit = StoreCredit {
            id: Uuid::new_v4().to_string(),
            credit_number,
            customer_id: customer_id.to_string(),
            original_kobo: amount_kobo,
            remaining_kobo: amount_kobo,
            is_active: true,
            issued_at: now,
            note: note.map(str::to_string),
        };

        debug!(number = %credit.credit_number, amount = %amount_kobo, "Issuing store credit");
        sqlx::query(
            "INSERT INTO store_credits (
                id, credit_number, customer_id, original_kobo, remaining_kobo,
                is_active, issued_at, note
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&credit.id)
        .bind(&credit.credit_number)
        .bind(&credit.customer_id)
        .bind(credit.original_kobo)
        .bind(credit.remaining_kobo)
        .bind(credit.is_active)
        .bind(credit.issued_at)
        .bind(&credit.note)
        .execute(conn)
        .await?;

        Ok(credit)
    }

    /// Active credits for a customer, oldest first (consumption order).
    pub async fn active_for_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Vec<StoreCredit>> {
        let sql = format!(
            "SELECT {CREDIT_COLUMNS} FROM store_credits \
             WHERE customer_id = ?1 AND is_active = 1 AND remaining_kobo > 0 \
             ORDER BY issued_at, id"
        );
        Ok(sqlx::query_as::<_, StoreCredit>(&sql)
            .bind(customer_id)
            .fetch_all(conn)
            .await?)
    }

    /// All credits for a customer (reporting).
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<StoreCredit>> {
        let sql = format!(
            "SELECT {CREDIT_COLUMNS} FROM store_credits \
             WHERE customer_id = ?1 ORDER BY issued_at, id"
        );
        Ok(sqlx::query_as::<_, StoreCredit>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Consumes `amount_kobo` from the customer's pool, oldest credit first.
    ///
    /// All-or-nothing: if the pool's total remaining balance is short,
    /// nothing is touched and the available total is reported back.
    pub async fn consume_fifo(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount_kobo: i64,
        receipt_id: &str,
    ) -> DbResult<CreditConsumption> {
        let credits = Self::active_for_customer(conn, customer_id).await?;
        let available: i64 = credits.iter().map(|c| c.remaining_kobo).sum();

        if available < amount_kobo {
            return Ok(CreditConsumption::Insufficient {
                available_kobo: available,
            });
        }

        let now = Utc::now();
        let mut remaining_to_deduct = amount_kobo;
        let mut usages = Vec::new();

        for credit in credits {
            if remaining_to_deduct <= 0 {
                break;
            }
            let deduct = credit.remaining_kobo.min(remaining_to_deduct);

            sqlx::query(
                "UPDATE store_credits SET
                    remaining_kobo = remaining_kobo - ?2,
                    is_active = CASE WHEN remaining_kobo - ?2 <= 0 THEN 0 ELSE is_active END
                 WHERE id = ?1",
            )
            .bind(&credit.id)
            .bind(deduct)
            .execute(&mut *conn)
            .await?;

            let usage = StoreCreditUsage {
                id: Uuid::new_v4().to_string(),
                credit_id: credit.id.clone(),
                receipt_id: receipt_id.to_string(),
                amount_kobo: deduct,
                used_at: now,
            };
            sqlx::query(
                "INSERT INTO store_credit_usages (id, credit_id, receipt_id, amount_kobo, used_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&usage.id)
            .bind(&usage.credit_id)
            .bind(&usage.receipt_id)
            .bind(usage.amount_kobo)
            .bind(usage.used_at)
            .execute(&mut *conn)
            .await?;

            debug!(
                credit = %credit.credit_number,
                deducted = %deduct,
                "Store credit consumed"
            );

            remaining_to_deduct -= deduct;
            usages.push(usage);
        }

        Ok(CreditConsumption::Applied { usages })
    }

    /// Usage history for one credit, oldest first.
    pub async fn usages(&self, credit_id: &str) -> DbResult<Vec<StoreCreditUsage>> {
        Ok(sqlx::query_as::<_, StoreCreditUsage>(
            "SELECT id, credit_id, receipt_id, amount_kobo, used_at
             FROM store_credit_usages WHERE credit_id = ?1 ORDER BY used_at, id",
        )
        .bind(credit_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::receipt::ReceiptRepository;
    use sable_core::types::{Receipt, ReceiptPaymentStatus};
    use sable_core::Money;

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query("INSERT INTO customers (id, name, created_at) VALUES ('c1', 'Amina Bello', ?1)")
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .unwrap();
        let receipt = Receipt {
            id: "r1".into(),
            receipt_number: "RCPT001/07/2025".into(),
            customer_id: Some("c1".into()),
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

    #[tokio::test]
    async fn test_issue_allocates_numbers() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = StoreCreditRepository::issue(&mut conn, "c1", 100_000, None).await.unwrap();
        let b = StoreCreditRepository::issue(&mut conn, "c1", 200_000, None).await.unwrap();
        assert!(a.credit_number.starts_with("SC001/"));
        assert!(b.credit_number.starts_with("SC002/"));
    }

    #[tokio::test]
    async fn test_fifo_consumes_oldest_first() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let older = StoreCreditRepository::issue(&mut conn, "c1", Money::from_naira(1_500).kobo(), None)
            .await
            .unwrap();
        let newer = StoreCreditRepository::issue(&mut conn, "c1", Money::from_naira(3_000).kobo(), None)
            .await
            .unwrap();

        let outcome = StoreCreditRepository::consume_fifo(
            &mut conn,
            "c1",
            Money::from_naira(4_000).kobo(),
            "r1",
        )
        .await
        .unwrap();

        let usages = match outcome {
            CreditConsumption::Applied { usages } => usages,
            other => panic!("expected Applied, got {other:?}"),
        };
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].credit_id, older.id);
        assert_eq!(usages[0].amount_kobo, Money::from_naira(1_500).kobo());
        assert_eq!(usages[1].credit_id, newer.id);
        assert_eq!(usages[1].amount_kobo, Money::from_naira(2_500).kobo());
        drop(conn);

        // Oldest exhausted and deactivated, newest keeps the remainder
        let credits = db.store_credits().list_for_customer("c1").await.unwrap();
        assert_eq!(credits[0].remaining_kobo, 0);
        assert!(!credits[0].is_active);
        assert_eq!(credits[1].remaining_kobo, Money::from_naira(500).kobo());
        assert!(credits[1].is_active);
    }

    #[tokio::test]
    async fn test_insufficient_pool_touches_nothing() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        StoreCreditRepository::issue(&mut conn, "c1", Money::from_naira(1_000).kobo(), None)
            .await
            .unwrap();

        let outcome = StoreCreditRepository::consume_fifo(
            &mut conn,
            "c1",
            Money::from_naira(5_000).kobo(),
            "r1",
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            CreditConsumption::Insufficient {
                available_kobo: Money::from_naira(1_000).kobo()
            }
        );
        drop(conn);

        let credits = db.store_credits().list_for_customer("c1").await.unwrap();
        assert_eq!(credits[0].remaining_kobo, Money::from_naira(1_000).kobo());
    }
}
