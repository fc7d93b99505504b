//! # Engine Error Type
//!
//! What callers of the use-case layer see.
//!
//! ## Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Core(...)            user-fixable: the request names the offending    │
//! │                       line/instrument/rule; the transaction aborted    │
//! │                       and nothing was persisted                        │
//! │  ReceiptNotFound      settlement against an unknown receipt            │
//! │  Conflict             transient lock/serialization failure; retry the  │
//! │                       ENTIRE checkout, never a sub-step                │
//! │  Db(...)              unexpected database failure                      │
//! │                                                                         │
//! │  Sink failures after a successful commit are NOT errors: they are     │
//! │  logged as warnings and the committed financial record stands.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use sable_core::CoreError;
use sable_db::DbError;

/// Errors surfaced by the engine use cases.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Business rule violation; the caller can correct and resubmit.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Settlement or recalculation against an unknown receipt.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// Transient conflict (lock timeout / serialization failure). Safe to
    /// retry the whole transaction from the top.
    #[error("Transient conflict, retry the transaction: {0}")]
    Conflict(String),

    /// Unexpected database failure.
    #[error("Database error: {0}")]
    Db(DbError),
}

impl EngineError {
    /// Whether retrying the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }

    /// Machine-readable code for API consumers.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(CoreError::InsufficientStock { .. }) => ErrorCode::InsufficientStock,
            EngineError::Core(CoreError::ProductNotFound(_))
            | EngineError::Core(CoreError::ReceiptNotFound(_)) => ErrorCode::NotFound,
            EngineError::Core(
                CoreError::NoPaymentInstrument
                | CoreError::PaymentMismatch { .. }
                | CoreError::InvalidInstrumentAmount { .. }
                | CoreError::UnknownPaymentMethod { .. }
                | CoreError::InsufficientStoreCredit { .. }
                | CoreError::CustomerRequiredForStoreCredit
                | CoreError::Overpayment { .. },
            ) => ErrorCode::PaymentError,
            EngineError::Core(CoreError::Redemption(_)) => ErrorCode::LoyaltyError,
            EngineError::Core(_) => ErrorCode::ValidationError,
            EngineError::ReceiptNotFound(_) => ErrorCode::NotFound,
            EngineError::Conflict(_) => ErrorCode::Conflict,
            EngineError::Db(_) => ErrorCode::DatabaseError,
        }
    }
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Insufficient stock on a specific line
    InsufficientStock,

    /// Payment reconciliation failed
    PaymentError,

    /// Loyalty redemption rejected
    LoyaltyError,

    /// Transient conflict; retry the whole transaction
    Conflict,

    /// Database operation failed
    DatabaseError,
}

/// Converts database errors, promoting the transient ones to `Conflict`.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        if err.is_retryable() {
            EngineError::Conflict(err.to_string())
        } else {
            EngineError::Db(err)
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
