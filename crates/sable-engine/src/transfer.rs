//! # Location Transfers
//!
//! Moves stock between locations: each item debits the source product and
//! credits the destination product as one unit, every item inside one
//! transaction. A single short line aborts the whole transfer.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::sinks::{AuditEvent, AuditSink};
use sable_core::sequence;
use sable_core::types::{LocationTransfer, TransferItem, TransferStatus};
use sable_core::CoreError;
use sable_db::repository::sequence as sequence_repo;
use sable_db::repository::transfer::{generate_transfer_id, generate_transfer_item_id};
use sable_db::{Database, DbError, StockDecrement, StockRepository, TransferRepository};

/// One requested movement: source product row → destination product row.
#[derive(Debug, Clone)]
pub struct TransferItemRequest {
    pub from_product_id: String,
    pub to_product_id: String,
    pub quantity: i64,
}

/// Executes a transfer between two locations.
///
/// Validates each item against the stock actually present at the declared
/// source (live, inside the transaction), debits it, and credits the
/// destination product. The reference is allocated from the same counter
/// table as receipt numbers.
pub async fn execute_transfer(
    db: &Database,
    audit: &dyn AuditSink,
    from_location: &str,
    to_location: &str,
    items: &[TransferItemRequest],
    note: Option<&str>,
) -> EngineResult<LocationTransfer> {
    if items.is_empty() {
        return Err(CoreError::Validation(sable_core::ValidationError::Required {
            field: "items".to_string(),
        })
        .into());
    }

    let mut tx = db.pool().begin().await.map_err(DbError::from)?;

    let now = Utc::now();
    let scope = format!("{}", now.format("%m%y"));
    let seq = sequence_repo::next_raw(&mut tx, "transfer", &scope).await?;
    let reference = sequence::transfer_reference(from_location, to_location, seq, now);

    let transfer_id = generate_transfer_id();
    let mut total_items = 0i64;
    let mut total_value = 0i64;
    let mut rows = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let source = StockRepository::get_by_id_tx(&mut tx, &item.from_product_id)
            .await?
            .filter(|p| p.location == from_location)
            .ok_or_else(|| CoreError::ProductNotFound(item.from_product_id.clone()))?;
        let destination = StockRepository::get_by_id_tx(&mut tx, &item.to_product_id)
            .await?
            .filter(|p| p.location == to_location)
            .ok_or_else(|| CoreError::ProductNotFound(item.to_product_id.clone()))?;

        match StockRepository::try_decrement(&mut tx, &source.id, item.quantity).await? {
            StockDecrement::Applied => {}
            StockDecrement::Insufficient { available } => {
                return Err(CoreError::InsufficientStock {
                    line: index,
                    product_id: source.id.clone(),
                    brand: source.brand.clone(),
                    available,
                    requested: item.quantity,
                }
                .into());
            }
        }
        StockRepository::restore(&mut tx, &destination.id, item.quantity).await?;

        let row = TransferItem {
            id: generate_transfer_item_id(),
            transfer_id: transfer_id.clone(),
            from_product_id: source.id.clone(),
            to_product_id: destination.id.clone(),
            quantity: item.quantity,
            unit_price_kobo: source.selling_price_kobo,
        };
        total_items += item.quantity;
        total_value += row.total_value().kobo();
        rows.push(row);
    }

    let transfer = LocationTransfer {
        id: transfer_id.clone(),
        reference: reference.clone(),
        from_location: from_location.to_string(),
        to_location: to_location.to_string(),
        status: TransferStatus::Completed,
        note: note.map(str::to_string),
        total_items,
        total_value_kobo: total_value,
        created_at: now,
    };
    TransferRepository::insert(&mut tx, &transfer).await?;
    for row in &rows {
        TransferRepository::insert_item(&mut tx, row).await?;
    }

    tx.commit().await.map_err(DbError::from)?;

    info!(
        reference = %reference,
        items = rows.len(),
        quantity = total_items,
        "Transfer completed"
    );

    let event = AuditEvent {
        actor: None,
        action: "stock_transfer".into(),
        object_kind: "LocationTransfer".into(),
        object_id: transfer_id,
        summary: serde_json::json!({
            "reference": reference,
            "from": from_location,
            "to": to_location,
            "total_items": total_items,
            "total_value_kobo": total_value,
        }),
    };
    if let Err(err) = audit.record(&event) {
        warn!(reference = %reference, error = %err, "Audit sink failed");
    }

    Ok(transfer)
}
