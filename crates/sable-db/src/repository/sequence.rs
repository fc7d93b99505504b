//! # Sequence Repository
//!
//! Allocates the human-readable sequential numbers (receipts, invoices,
//! store credits, transfers) safely under concurrent callers.
//!
//! ## Allocation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A dedicated counter table, bumped with ONE atomic statement:           │
//! │                                                                         │
//! │    UPDATE number_sequences SET last_number = last_number + 1           │
//! │    WHERE kind = ? AND scope = ?                                        │
//! │    RETURNING last_number                                               │
//! │                                                                         │
//! │  Run inside the checkout's transaction: the number only becomes        │
//! │  visible if the sale commits, two concurrent checkouts can never       │
//! │  read the same "highest" value, and a crash after allocation leaves    │
//! │  at most a gap - never a duplicate.                                    │
//! │                                                                         │
//! │  A missing counter row is seeded from the highest parseable existing   │
//! │  number in the scope (INSERT OR IGNORE, so two concurrent seeders      │
//! │  are harmless). An unparseable legacy number seeds 0: the scope        │
//! │  restarts at 1 rather than failing the sale.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use sable_core::sequence::{self, SequenceKind};

/// Allocates the next number in `kind`'s scope for the given instant.
///
/// Returns the fully formatted identifier, e.g. `RCPT004/07/2025`.
/// Must be called on an open transaction so the allocation commits or
/// rolls back with the rest of the sale.
pub async fn next_number(
    conn: &mut SqliteConnection,
    kind: SequenceKind,
    at: DateTime<Utc>,
) -> DbResult<String> {
    let scope = kind.scope_for(at);
    let seq = next_in_scope(conn, kind.as_str(), &scope, seed_for(kind)).await?;
    let number = sequence::format_number(kind, seq, &scope);

    debug!(kind = kind.as_str(), scope = %scope, number = %number, "Allocated sequence number");
    Ok(number)
}

/// Allocates the next raw counter value for an arbitrary (kind, scope) pair.
/// Used directly for transfer references, which have their own format.
pub async fn next_raw(
    conn: &mut SqliteConnection,
    kind: &str,
    scope: &str,
) -> DbResult<i64> {
    next_in_scope(conn, kind, scope, None).await
}

async fn next_in_scope(
    conn: &mut SqliteConnection,
    kind: &str,
    scope: &str,
    seed: Option<SeedQuery>,
) -> DbResult<i64> {
    // Seed the counter row on first use of a scope. OR IGNORE makes a lost
    // race a no-op; the increment below is the serialization point.
    let exists: Option<i64> = sqlx::query_scalar(
        "SELECT last_number FROM number_sequences WHERE kind = ?1 AND scope = ?2",
    )
    .bind(kind)
    .bind(scope)
    .fetch_optional(&mut *conn)
    .await?;

    if exists.is_none() {
        let start = match seed {
            Some(query) => highest_existing(&mut *conn, query, scope).await?,
            None => 0,
        };
        sqlx::query(
            "INSERT OR IGNORE INTO number_sequences (kind, scope, last_number) VALUES (?1, ?2, ?3)",
        )
        .bind(kind)
        .bind(scope)
        .bind(start)
        .execute(&mut *conn)
        .await?;
    }

    let seq: i64 = sqlx::query_scalar(
        "UPDATE number_sequences SET last_number = last_number + 1 \
         WHERE kind = ?1 AND scope = ?2 \
         RETURNING last_number",
    )
    .bind(kind)
    .bind(scope)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::Internal(format!("sequence counter vanished: {kind}/{scope}")))?;

    Ok(seq)
}

/// Where to look for pre-counter legacy numbers when seeding a scope.
#[derive(Debug, Clone, Copy)]
struct SeedQuery {
    kind: SequenceKind,
    table: &'static str,
    column: &'static str,
}

fn seed_for(kind: SequenceKind) -> Option<SeedQuery> {
    let (table, column) = match kind {
        SequenceKind::Receipt => ("receipts", "receipt_number"),
        SequenceKind::StoreCredit => ("store_credits", "credit_number"),
        // No legacy invoice rows predate the counter table.
        SequenceKind::Invoice => return None,
    };
    Some(SeedQuery { kind, table, column })
}

/// Highest parseable existing number in the scope; 0 when the scope is
/// empty OR the latest number does not parse (numbering restarts rather
/// than crashing the sale).
async fn highest_existing(
    conn: &mut SqliteConnection,
    query: SeedQuery,
    scope: &str,
) -> DbResult<i64> {
    let sql = format!(
        "SELECT {column} FROM {table} WHERE {column} LIKE '%' || ?1 ORDER BY rowid DESC LIMIT 1",
        column = query.column,
        table = query.table,
    );
    let last: Option<String> = sqlx::query_scalar(&sql)
        .bind(format!("/{scope}"))
        .fetch_optional(conn)
        .await?;

    match last {
        None => Ok(0),
        Some(number) => match sequence::parse_number(query.kind, &number) {
            Some(seq) => Ok(seq),
            None => {
                warn!(number = %number, scope = %scope, "Unparseable legacy number; restarting scope at 1");
                Ok(0)
            }
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn july() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_numbers_are_contiguous_from_one() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        for expected in 1..=4 {
            let number = next_number(&mut conn, SequenceKind::Receipt, july()).await.unwrap();
            assert_eq!(number, format!("RCPT{:03}/07/2025", expected));
        }
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let august = Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap();
        next_number(&mut conn, SequenceKind::Receipt, july()).await.unwrap();
        next_number(&mut conn, SequenceKind::Receipt, july()).await.unwrap();

        // New month restarts at 1
        let number = next_number(&mut conn, SequenceKind::Receipt, august).await.unwrap();
        assert_eq!(number, "RCPT001/08/2025");

        // Invoice numbering is year-scoped and independent of receipts
        let number = next_number(&mut conn, SequenceKind::Invoice, july()).await.unwrap();
        assert_eq!(number, "INV001/2025");
    }

    #[tokio::test]
    async fn test_seeds_from_existing_rows() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        // A legacy receipt exists but no counter row
        sqlx::query(
            "INSERT INTO receipts (id, receipt_number, created_at) VALUES ('r1', 'RCPT007/07/2025', ?1)",
        )
        .bind(july())
        .execute(&mut *conn)
        .await
        .unwrap();

        let number = next_number(&mut conn, SequenceKind::Receipt, july()).await.unwrap();
        assert_eq!(number, "RCPT008/07/2025");
    }

    #[tokio::test]
    async fn test_unparseable_legacy_number_restarts_at_one() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        sqlx::query(
            "INSERT INTO receipts (id, receipt_number, created_at) VALUES ('r1', 'LEGACY-junk/07/2025', ?1)",
        )
        .bind(july())
        .execute(&mut *conn)
        .await
        .unwrap();

        // Never crash the sale: scope restarts at 1
        let number = next_number(&mut conn, SequenceKind::Receipt, july()).await.unwrap();
        assert_eq!(number, "RCPT001/07/2025");
    }

    #[tokio::test]
    async fn test_raw_counter_for_transfers() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(next_raw(&mut conn, "transfer", "0725").await.unwrap(), 1);
        assert_eq!(next_raw(&mut conn, "transfer", "0725").await.unwrap(), 2);
    }
}
