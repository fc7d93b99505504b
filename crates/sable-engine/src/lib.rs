//! # sable-engine: Transaction Orchestration for Sable POS
//!
//! The use-case layer on top of [`sable_core`] (pure business logic) and
//! [`sable_db`] (SQLite persistence).
//!
//! ## Use Cases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout      one cart → one committed Receipt/Payment/Loyalty graph  │
//! │                (the Validating → ... → Committed state machine)        │
//! │  settlement    later payments against a deposit receipt's balance      │
//! │  recalculate   explicit full recompute of a receipt's breakdown        │
//! │  transfer      stock movement between locations                        │
//! │  sinks         fire-and-forget notification + audit seams              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every use case runs inside one SQLite transaction; anything that would
//! leave the financial graph inconsistent aborts and rolls back completely.
//! Side effects to external collaborators happen strictly after commit and
//! never propagate failure.

pub mod checkout;
pub mod error;
pub mod recalculate;
pub mod request;
pub mod settlement;
pub mod sinks;
pub mod transfer;

pub use checkout::CheckoutService;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use recalculate::{recalculate, update_bill_discount};
pub use request::{
    CheckoutReceipt, CheckoutRequest, InstrumentRequest, InstrumentSummary, LineRequest,
    SettlementOutcome,
};
pub use settlement::{settle_payment, SETTLE_OVERPAY_TOLERANCE};
pub use sinks::{AuditEvent, AuditSink, LogSink, NotificationSink, ReceiptReady, SinkError};
pub use transfer::{execute_transfer, TransferItemRequest};
