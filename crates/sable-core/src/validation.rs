//! # Validation Module
//!
//! Input validation utilities shared by the checkout and settlement flows.
//!
//! These run early, before any business logic, so a malformed request is
//! rejected with a precise field-level error rather than surfacing as a
//! constraint violation deep inside the transaction.

use crate::error::ValidationError;
use crate::money::{Money, Rate};
use crate::{MAX_LINE_QUANTITY, MAX_RECEIPT_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive
/// - Must not exceed `MAX_LINE_QUANTITY` (catches "1000 instead of 10" typos)
///
/// ## Example
/// ```rust
/// use sable_core::validation::validate_quantity;
///
/// assert!(validate_quantity(3).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(5_000).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates the number of lines on a receipt.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }
    if count > MAX_RECEIPT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_RECEIPT_LINES as i64,
        });
    }
    Ok(())
}

/// Validates a monetary amount that must be non-negative (delivery cost,
/// line discount).
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a bill-level discount rate (0..=100%).
pub fn validate_discount_rate(rate: Rate) -> ValidationResult<()> {
    if rate.bps() > Rate::FULL.bps() {
        return Err(ValidationError::OutOfRange {
            field: "discount_percentage".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Validates a payment method code's shape (lowercase snake_case).
///
/// Existence on the allow-list is checked separately by
/// `InstrumentKind::from_code`.
pub fn validate_method_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "payment_method".to_string(),
        });
    }
    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "payment_method".to_string(),
            max: 50,
        });
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "payment_method".to_string(),
            reason: "must contain only lowercase letters, digits, and underscores".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
