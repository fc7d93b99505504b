//! # Error Types
//!
//! Domain-specific error types for sable-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  sable-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── RedemptionError  - Loyalty redemption rejections (loyalty.rs)     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  sable-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  sable-engine errors (separate crate)                                  │
//! │  └── EngineError      - What the caller sees (with error codes)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (which line, which instrument)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::loyalty::RedemptionError;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Anything that would leave the receipt/payment/stock graph inconsistent is
/// fatal to the transaction; the caller aborts and rolls everything back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Receipt cannot be found (settlement against an unknown receipt).
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// Insufficient stock to complete a sale line.
    ///
    /// `line` is the zero-based index of the offending line so the cashier
    /// can correct exactly that row and resubmit.
    #[error("Insufficient stock for {brand} (line {line}): available {available}, requested {requested}")]
    InsufficientStock {
        line: usize,
        product_id: String,
        brand: String,
        available: i64,
        requested: i64,
    },

    /// A non-zero total was tendered with no payment instrument at all.
    #[error("At least one payment method is required")]
    NoPaymentInstrument,

    /// Tendered instruments do not sum to the expected total (±1 kobo).
    #[error("Payment mismatch: expected {expected_kobo} kobo, tendered {tendered_kobo} kobo")]
    PaymentMismatch {
        expected_kobo: i64,
        tendered_kobo: i64,
    },

    /// An instrument amount is zero or negative.
    #[error("Payment method {index} has invalid amount: {amount_kobo} kobo")]
    InvalidInstrumentAmount { index: usize, amount_kobo: i64 },

    /// Instrument code is neither a built-in method nor on the allow-list.
    #[error("Unknown payment method: {code}")]
    UnknownPaymentMethod { code: String },

    /// Store credit instrument exceeds the customer's remaining credit pool.
    #[error("Insufficient store credit: available {available_kobo} kobo, requested {requested_kobo} kobo")]
    InsufficientStoreCredit {
        available_kobo: i64,
        requested_kobo: i64,
    },

    /// A store-credit instrument was tendered without a customer on the sale.
    #[error("A customer must be selected to pay with store credit")]
    CustomerRequiredForStoreCredit,

    /// Settlement exceeds the outstanding balance beyond the allowed tolerance.
    #[error("Overpayment: balance due {balance_kobo} kobo, tendered {tendered_kobo} kobo")]
    Overpayment {
        balance_kobo: i64,
        tendered_kobo: i64,
    },

    /// Receipt has more lines than the configured maximum.
    #[error("Receipt cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// Loyalty redemption rejected (wraps RedemptionError).
    #[error("Loyalty redemption rejected: {0}")]
    Redemption(#[from] RedemptionError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid method code, invalid number format).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            line: 2,
            product_id: "p1".to_string(),
            brand: "Clarks Desert Boot".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Clarks Desert Boot (line 2): available 3, requested 5"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
