//! # External Sinks
//!
//! Fire-and-forget seams to the collaborators outside the financial core:
//! the notification fan-out (email, printing) and the audit log.
//!
//! Both are invoked AFTER the transaction has committed. A sink failure is
//! logged as a warning and never propagated - the committed financial
//! record stands regardless of what the printer thinks.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::request::InstrumentSummary;
use sable_core::types::{Receipt, SaleLine};

/// A sink refused or failed to accept an event.
#[derive(Debug, Error)]
#[error("sink failure: {0}")]
pub struct SinkError(pub String);

/// "Receipt ready" event: the fully priced receipt plus its line items,
/// consumed asynchronously by email/printing collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptReady {
    pub receipt: Receipt,
    pub lines: Vec<SaleLine>,
    pub instruments: Vec<InstrumentSummary>,
}

/// One structured event per committed transaction.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Who performed the action (cashier), if known.
    pub actor: Option<String>,
    /// e.g. "sale_create", "payment_settle", "stock_transfer".
    pub action: String,
    pub object_kind: String,
    pub object_id: String,
    /// Before/after summary, action-specific.
    pub summary: serde_json::Value,
}

/// Consumer of receipt-ready events.
pub trait NotificationSink: Send + Sync {
    fn receipt_ready(&self, event: &ReceiptReady) -> Result<(), SinkError>;
}

/// Consumer of audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), SinkError>;
}

/// Default sink: structured log lines. Stands in until a real email/print
/// dispatcher is wired up, and is what tests run against.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn receipt_ready(&self, event: &ReceiptReady) -> Result<(), SinkError> {
        info!(
            receipt = %event.receipt.receipt_number,
            lines = event.lines.len(),
            total = %event.receipt.grand_total(),
            "receipt ready"
        );
        Ok(())
    }
}

impl AuditSink for LogSink {
    fn record(&self, event: &AuditEvent) -> Result<(), SinkError> {
        info!(
            actor = event.actor.as_deref().unwrap_or("-"),
            action = %event.action,
            object = %format!("{}:{}", event.object_kind, event.object_id),
            "audit"
        );
        Ok(())
    }
}
