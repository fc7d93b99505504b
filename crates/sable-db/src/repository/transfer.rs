//! # Transfer Repository
//!
//! Rows for inventory movements between locations. The stock side effects
//! (debit source, credit destination) are driven by the engine inside one
//! transaction; this repository only persists the records.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use sable_core::types::{LocationTransfer, TransferItem, TransferStatus};

const TRANSFER_COLUMNS: &str = "id, reference, from_location, to_location, status, note, \
     total_items, total_value_kobo, created_at";

/// Repository for location-transfer records.
#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    /// Creates a new TransferRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    /// Inserts the transfer header.
    pub async fn insert(conn: &mut SqliteConnection, transfer: &LocationTransfer) -> DbResult<()> {
        debug!(reference = %transfer.reference, "Inserting transfer");

        sqlx::query(
            "INSERT INTO location_transfers (
                id, reference, from_location, to_location, status, note,
                total_items, total_value_kobo, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&transfer.id)
        .bind(&transfer.reference)
        .bind(&transfer.from_location)
        .bind(&transfer.to_location)
        .bind(transfer.status)
        .bind(&transfer.note)
        .bind(transfer.total_items)
        .bind(transfer.total_value_kobo)
        .bind(transfer.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts one transfer item row.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &TransferItem) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO transfer_items (id, transfer_id, from_product_id, to_product_id, quantity, unit_price_kobo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&item.id)
        .bind(&item.transfer_id)
        .bind(&item.from_product_id)
        .bind(&item.to_product_id)
        .bind(item.quantity)
        .bind(item.unit_price_kobo)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Updates the transfer status.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        id: &str,
        status: TransferStatus,
    ) -> DbResult<()> {
        sqlx::query("UPDATE location_transfers SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Gets a transfer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<LocationTransfer>> {
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM location_transfers WHERE id = ?1");
        Ok(sqlx::query_as::<_, LocationTransfer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Items for a transfer.
    pub async fn items(&self, transfer_id: &str) -> DbResult<Vec<TransferItem>> {
        Ok(sqlx::query_as::<_, TransferItem>(
            "SELECT id, transfer_id, from_product_id, to_product_id, quantity, unit_price_kobo
             FROM transfer_items WHERE transfer_id = ?1 ORDER BY id",
        )
        .bind(transfer_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Generates a new transfer row ID.
pub fn generate_transfer_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new transfer item ID.
pub fn generate_transfer_item_id() -> String {
    Uuid::new_v4().to_string()
}
