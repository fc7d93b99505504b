//! # Stock Repository
//!
//! Exclusive owner of on-hand quantity per product/location.
//!
//! ## The Decrement Race
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: read-check-write from the application layer                  │
//! │     let p = get(id);            // both checkouts read quantity = 1    │
//! │     if p.quantity >= n { ... }  // both pass the check                 │
//! │     set_quantity(p.quantity-n); // stock goes negative                 │
//! │                                                                         │
//! │  ✅ CORRECT: one conditional UPDATE                                     │
//! │     UPDATE products SET quantity = quantity - ?                        │
//! │     WHERE id = ? AND quantity >= ?                                     │
//! │                                                                         │
//! │  Zero rows affected = insufficient stock at THIS instant; the caller   │
//! │  re-reads the live quantity for the error message and aborts the       │
//! │  whole transaction.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Selling price is always re-derived from cost + markup on change; callers
//! never hand-set it.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use sable_core::types::{derive_selling_price, MarkupKind, Product, ShopZone};

const PRODUCT_COLUMNS: &str = "id, brand, category, cost_price_kobo, markup_kind, markup_value, \
     selling_price_kobo, quantity, location, shop_zone, is_active, created_at, updated_at";

/// Result of an atomic conditional decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// Quantity was decremented.
    Applied,
    /// Not enough stock; carries the quantity actually available at the
    /// moment of the attempt.
    Insufficient { available: i64 },
}

/// Repository for product stock operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product inside an open transaction (live read, not a cached
    /// value from earlier in the request).
    pub async fn get_by_id_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(product)
    }

    /// Lists active, in-stock products on the shop floor of a location.
    pub async fn list_sellable(&self, location: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND quantity > 0 AND shop_zone = ?1 AND location = ?2 \
             ORDER BY brand"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(ShopZone::Store)
            .bind(location)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Inserts a new product. The selling price is derived here, whatever
    /// the caller put in the struct.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(brand = %product.brand, "Inserting product");

        let mut product = product.clone();
        product.selling_price_kobo = product.derive_selling_price().kobo();

        sqlx::query(
            "INSERT INTO products (
                id, brand, category, cost_price_kobo, markup_kind, markup_value,
                selling_price_kobo, quantity, location, shop_zone, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&product.id)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.cost_price_kobo)
        .bind(product.markup_kind)
        .bind(product.markup_value)
        .bind(product.selling_price_kobo)
        .bind(product.quantity)
        .bind(&product.location)
        .bind(product.shop_zone)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Updates cost price and markup, re-deriving the selling price in the
    /// same statement's values.
    pub async fn update_cost_and_markup(
        &self,
        id: &str,
        cost_price_kobo: i64,
        markup_kind: MarkupKind,
        markup_value: i64,
    ) -> DbResult<()> {
        let selling = derive_selling_price(
            sable_core::Money::from_kobo(cost_price_kobo),
            markup_kind,
            markup_value,
        );
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET
                cost_price_kobo = ?2,
                markup_kind = ?3,
                markup_value = ?4,
                selling_price_kobo = ?5,
                updated_at = ?6
             WHERE id = ?1",
        )
        .bind(id)
        .bind(cost_price_kobo)
        .bind(markup_kind)
        .bind(markup_value)
        .bind(selling.kobo())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Atomically decrements stock, failing if the result would go negative.
    ///
    /// This is the single statement that closes the race between two
    /// concurrent sales of the same product. Must run on the checkout's
    /// transaction connection.
    pub async fn try_decrement(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<StockDecrement> {
        debug!(id = %id, quantity = %quantity, "Decrementing stock");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET
                quantity = quantity - ?2,
                updated_at = ?3
             WHERE id = ?1 AND quantity >= ?2",
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let available = Self::quantity_of(conn, id).await?;
            return Ok(StockDecrement::Insufficient { available });
        }

        Ok(StockDecrement::Applied)
    }

    /// Restores stock (order cancellation, return, transfer credit).
    pub async fn restore(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
        debug!(id = %id, quantity = %quantity, "Restoring stock");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET
                quantity = quantity + ?2,
                updated_at = ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Live quantity for a product. Zero if the product does not exist -
    /// callers only use this for error reporting.
    pub async fn quantity_of(conn: &mut SqliteConnection, id: &str) -> DbResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Soft-deletes a product. Historical receipts still reference it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use sable_core::Money;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn product(quantity: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            brand: "Clarks Desert Boot".into(),
            category: "shoes".into(),
            cost_price_kobo: Money::from_naira(8_000).kobo(),
            markup_kind: MarkupKind::Percentage,
            markup_value: 2_500,
            selling_price_kobo: 0, // derived on insert
            quantity,
            location: "ABUJA".into(),
            shop_zone: ShopZone::Store,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_derives_selling_price() {
        let db = db().await;
        let inserted = db.stock().insert(&product(5)).await.unwrap();
        assert_eq!(inserted.selling_price_kobo, Money::from_naira(10_000).kobo());

        let fetched = db.stock().get_by_id(&inserted.id).await.unwrap().unwrap();
        assert_eq!(fetched.selling_price_kobo, Money::from_naira(10_000).kobo());
    }

    #[tokio::test]
    async fn test_update_cost_rederives_selling_price() {
        let db = db().await;
        let p = db.stock().insert(&product(5)).await.unwrap();

        db.stock()
            .update_cost_and_markup(&p.id, Money::from_naira(10_000).kobo(), MarkupKind::Fixed, Money::from_naira(1_500).kobo())
            .await
            .unwrap();

        let fetched = db.stock().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(fetched.selling_price_kobo, Money::from_naira(11_500).kobo());
    }

    #[tokio::test]
    async fn test_decrement_happy_path() {
        let db = db().await;
        let p = db.stock().insert(&product(5)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let outcome = StockRepository::try_decrement(&mut conn, &p.id, 3).await.unwrap();
        assert_eq!(outcome, StockDecrement::Applied);
        assert_eq!(StockRepository::quantity_of(&mut conn, &p.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_decrement_insufficient_reports_available() {
        let db = db().await;
        let p = db.stock().insert(&product(2)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let outcome = StockRepository::try_decrement(&mut conn, &p.id, 3).await.unwrap();
        assert_eq!(outcome, StockDecrement::Insufficient { available: 2 });

        // Nothing was deducted
        assert_eq!(StockRepository::quantity_of(&mut conn, &p.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_decrement_to_exactly_zero() {
        let db = db().await;
        let p = db.stock().insert(&product(3)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let outcome = StockRepository::try_decrement(&mut conn, &p.id, 3).await.unwrap();
        assert_eq!(outcome, StockDecrement::Applied);
        assert_eq!(StockRepository::quantity_of(&mut conn, &p.id).await.unwrap(), 0);

        // Next attempt fails with available = 0
        let outcome = StockRepository::try_decrement(&mut conn, &p.id, 1).await.unwrap();
        assert_eq!(outcome, StockDecrement::Insufficient { available: 0 });
    }

    #[tokio::test]
    async fn test_restore() {
        let db = db().await;
        let p = db.stock().insert(&product(1)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        StockRepository::try_decrement(&mut conn, &p.id, 1).await.unwrap();
        StockRepository::restore(&mut conn, &p.id, 1).await.unwrap();
        assert_eq!(StockRepository::quantity_of(&mut conn, &p.id).await.unwrap(), 1);
    }
}
