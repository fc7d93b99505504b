//! # Loyalty Repository
//!
//! Balances, counters, and the append-only points ledger.
//!
//! Every balance change is one atomic UPDATE paired with exactly one
//! `loyalty_transactions` row recording the delta and the resulting balance.
//! The redeem path is conditional (`WHERE current_balance >= ?`) so even a
//! caller that skipped validation cannot drive a balance negative.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use sable_core::loyalty::CounterReset;
use sable_core::types::{LoyaltyAccount, LoyaltyTransaction, LoyaltyTxnKind};

const ACCOUNT_COLUMNS: &str = "id, customer_id, current_balance, total_earned, total_redeemed, \
     transaction_count, item_count, discount_count, is_active, enrolled_at, updated_at";

const TXN_COLUMNS: &str = "id, account_id, kind, points, balance_after, monetary_value_kobo, \
     receipt_id, description, created_at";

/// Repository for loyalty account operations.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    /// Creates a new LoyaltyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Gets an account by customer.
    pub async fn get_by_customer(&self, customer_id: &str) -> DbResult<Option<LoyaltyAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM loyalty_accounts WHERE customer_id = ?1");
        Ok(sqlx::query_as::<_, LoyaltyAccount>(&sql)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Gets or creates the account for a customer, inside the transaction.
    pub async fn get_or_create(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<LoyaltyAccount> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM loyalty_accounts WHERE customer_id = ?1");
        if let Some(account) = sqlx::query_as::<_, LoyaltyAccount>(&sql)
            .bind(customer_id)
            .fetch_optional(&mut *conn)
            .await?
        {
            return Ok(account);
        }

        let now = Utc::now();
        let account = LoyaltyAccount {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            current_balance: 0,
            total_earned: 0,
            total_redeemed: 0,
            transaction_count: 0,
            item_count: 0,
            discount_count: 0,
            is_active: true,
            enrolled_at: now,
            updated_at: now,
        };

        debug!(customer_id = %customer_id, "Enrolling loyalty account");
        sqlx::query(
            "INSERT INTO loyalty_accounts (
                id, customer_id, current_balance, total_earned, total_redeemed,
                transaction_count, item_count, discount_count, is_active,
                enrolled_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&account.id)
        .bind(&account.customer_id)
        .bind(account.current_balance)
        .bind(account.total_earned)
        .bind(account.total_redeemed)
        .bind(account.transaction_count)
        .bind(account.item_count)
        .bind(account.discount_count)
        .bind(account.is_active)
        .bind(account.enrolled_at)
        .bind(account.updated_at)
        .execute(conn)
        .await?;

        Ok(account)
    }

    /// Credits points and appends the matching ledger row.
    ///
    /// Returns the balance after accrual.
    pub async fn accrue(
        conn: &mut SqliteConnection,
        account_id: &str,
        points: i64,
        monetary_value_kobo: Option<i64>,
        receipt_id: Option<&str>,
        description: &str,
    ) -> DbResult<i64> {
        debug!(account_id = %account_id, points = %points, "Accruing loyalty points");

        let now = Utc::now();
        let balance_after: i64 = sqlx::query_scalar(
            "UPDATE loyalty_accounts SET
                total_earned = total_earned + ?2,
                current_balance = current_balance + ?2,
                updated_at = ?3
             WHERE id = ?1
             RETURNING current_balance",
        )
        .bind(account_id)
        .bind(points)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("LoyaltyAccount", account_id))?;

        Self::append_txn(
            conn,
            account_id,
            LoyaltyTxnKind::Earned,
            points,
            balance_after,
            monetary_value_kobo,
            receipt_id,
            description,
        )
        .await?;

        Ok(balance_after)
    }

    /// Debits points and appends the matching ledger row.
    ///
    /// The UPDATE is conditional on sufficient balance; callers validate
    /// first through the loyalty engine, so a zero-row update here means
    /// something raced or skipped validation and the transaction must abort.
    pub async fn redeem(
        conn: &mut SqliteConnection,
        account_id: &str,
        points: i64,
        monetary_value_kobo: i64,
        receipt_id: Option<&str>,
        description: &str,
    ) -> DbResult<i64> {
        debug!(account_id = %account_id, points = %points, "Redeeming loyalty points");

        let now = Utc::now();
        let balance_after: i64 = sqlx::query_scalar(
            "UPDATE loyalty_accounts SET
                total_redeemed = total_redeemed + ?2,
                current_balance = current_balance - ?2,
                updated_at = ?3
             WHERE id = ?1 AND current_balance >= ?2
             RETURNING current_balance",
        )
        .bind(account_id)
        .bind(points)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::CheckViolation {
            message: format!("loyalty balance below {points} points for account {account_id}"),
        })?;

        Self::append_txn(
            conn,
            account_id,
            LoyaltyTxnKind::Redeemed,
            points,
            balance_after,
            Some(monetary_value_kobo),
            receipt_id,
            description,
        )
        .await?;

        Ok(balance_after)
    }

    /// Bumps the count-threshold counters for one qualifying sale.
    pub async fn bump_counters(
        conn: &mut SqliteConnection,
        account_id: &str,
        transactions: i64,
        items: i64,
    ) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE loyalty_accounts SET
                transaction_count = transaction_count + ?2,
                item_count = item_count + ?3,
                updated_at = ?4
             WHERE id = ?1",
        )
        .bind(account_id)
        .bind(transactions)
        .bind(items)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Consumes a count-threshold discount: resets the relevant counter and
    /// bumps the consumed-discount counter.
    pub async fn apply_count_reset(
        conn: &mut SqliteConnection,
        account_id: &str,
        reset: CounterReset,
    ) -> DbResult<()> {
        let now = Utc::now();
        match reset {
            CounterReset::TransactionCount => {
                sqlx::query(
                    "UPDATE loyalty_accounts SET
                        transaction_count = 0,
                        discount_count = discount_count + 1,
                        updated_at = ?2
                     WHERE id = ?1",
                )
                .bind(account_id)
                .bind(now)
                .execute(conn)
                .await?;
            }
            CounterReset::ItemCount { remainder } => {
                sqlx::query(
                    "UPDATE loyalty_accounts SET
                        item_count = ?2,
                        discount_count = discount_count + 1,
                        updated_at = ?3
                     WHERE id = ?1",
                )
                .bind(account_id)
                .bind(remainder)
                .bind(now)
                .execute(conn)
                .await?;
            }
        }

        Ok(())
    }

    /// Ledger entries for an account, newest first.
    pub async fn transactions(&self, account_id: &str) -> DbResult<Vec<LoyaltyTransaction>> {
        let sql = format!(
            "SELECT {TXN_COLUMNS} FROM loyalty_transactions \
             WHERE account_id = ?1 ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, LoyaltyTransaction>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_txn(
        conn: &mut SqliteConnection,
        account_id: &str,
        kind: LoyaltyTxnKind,
        points: i64,
        balance_after: i64,
        monetary_value_kobo: Option<i64>,
        receipt_id: Option<&str>,
        description: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO loyalty_transactions (
                id, account_id, kind, points, balance_after, monetary_value_kobo,
                receipt_id, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(account_id)
        .bind(kind)
        .bind(points)
        .bind(balance_after)
        .bind(monetary_value_kobo)
        .bind(receipt_id)
        .bind(description)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db_with_customer() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO customers (id, name, created_at) VALUES ('c1', 'Amina Bello', ?1)")
            .bind(Utc::now())
            .execute(db.pool())
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = db_with_customer().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = LoyaltyRepository::get_or_create(&mut conn, "c1").await.unwrap();
        let b = LoyaltyRepository::get_or_create(&mut conn, "c1").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_accrue_and_redeem_keep_conservation() {
        let db = db_with_customer().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let account = LoyaltyRepository::get_or_create(&mut conn, "c1").await.unwrap();

        LoyaltyRepository::accrue(&mut conn, &account.id, 1_000, None, None, "purchase")
            .await
            .unwrap();
        let balance = LoyaltyRepository::redeem(&mut conn, &account.id, 600, 60_000, None, "discount")
            .await
            .unwrap();
        assert_eq!(balance, 400);
        drop(conn);

        let account = db.loyalty().get_by_customer("c1").await.unwrap().unwrap();
        assert!(account.conserves_points());
        assert_eq!(account.current_balance, 400);
        assert_eq!(account.total_earned, 1_000);
        assert_eq!(account.total_redeemed, 600);

        // One ledger row per balance change, each carrying balance_after
        let ledger = db.loyalty().transactions(&account.id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].kind, LoyaltyTxnKind::Redeemed);
        assert_eq!(ledger[0].balance_after, 400);
        assert_eq!(ledger[1].kind, LoyaltyTxnKind::Earned);
        assert_eq!(ledger[1].balance_after, 1_000);
    }

    #[tokio::test]
    async fn test_redeem_beyond_balance_is_rejected_without_mutation() {
        let db = db_with_customer().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let account = LoyaltyRepository::get_or_create(&mut conn, "c1").await.unwrap();

        LoyaltyRepository::accrue(&mut conn, &account.id, 100, None, None, "purchase")
            .await
            .unwrap();
        let err = LoyaltyRepository::redeem(&mut conn, &account.id, 500, 50_000, None, "discount")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
        drop(conn);

        let account = db.loyalty().get_by_customer("c1").await.unwrap().unwrap();
        assert_eq!(account.current_balance, 100);
        assert_eq!(account.total_redeemed, 0);
        // No ledger row for the rejected attempt
        assert_eq!(db.loyalty().transactions(&account.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counter_bump_and_resets() {
        let db = db_with_customer().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let account = LoyaltyRepository::get_or_create(&mut conn, "c1").await.unwrap();

        LoyaltyRepository::bump_counters(&mut conn, &account.id, 1, 23).await.unwrap();
        LoyaltyRepository::apply_count_reset(&mut conn, &account.id, CounterReset::ItemCount { remainder: 3 })
            .await
            .unwrap();
        drop(conn);

        let account = db.loyalty().get_by_customer("c1").await.unwrap().unwrap();
        assert_eq!(account.transaction_count, 1);
        assert_eq!(account.item_count, 3);
        assert_eq!(account.discount_count, 1);
    }
}
