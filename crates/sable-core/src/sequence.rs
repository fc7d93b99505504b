//! # Sequence Number Formats
//!
//! Formatting and parsing for the human-readable sequential identifiers:
//!
//! ```text
//! ┌──────────────┬──────────────────────┬─────────────────────────────────┐
//! │ Kind         │ Scope                │ Example                         │
//! ├──────────────┼──────────────────────┼─────────────────────────────────┤
//! │ Receipt      │ month  (MM/YYYY)     │ RCPT004/07/2025                 │
//! │ Invoice      │ year   (YYYY)        │ INV012/2025                     │
//! │ StoreCredit  │ month  (MM/YYYY)     │ SC003/07/2025                   │
//! └──────────────┴──────────────────────┴─────────────────────────────────┘
//! ```
//!
//! The sequence is zero-padded to three digits and simply grows wider past
//! 999. Numbering restarts at 1 in each new scope. Parsing is deliberately
//! forgiving: an unparseable existing number is treated as "scope empty" by
//! the allocator, so a malformed legacy row can never crash a sale.
//!
//! Allocation itself (the concurrent part) lives in
//! `sable-db::repository::sequence`; this module is pure string/date math.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Kinds and Scopes
// =============================================================================

/// Which numbered document a sequence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    Receipt,
    Invoice,
    StoreCredit,
}

impl SequenceKind {
    /// Fixed-width prefix in front of the numeric part.
    pub const fn prefix(&self) -> &'static str {
        match self {
            SequenceKind::Receipt => "RCPT",
            SequenceKind::Invoice => "INV",
            SequenceKind::StoreCredit => "SC",
        }
    }

    /// Stable key for the counter table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::Receipt => "receipt",
            SequenceKind::Invoice => "invoice",
            SequenceKind::StoreCredit => "store_credit",
        }
    }

    /// The period scope within which numbers are unique and contiguous.
    pub fn scope_for(&self, at: DateTime<Utc>) -> String {
        match self {
            SequenceKind::Receipt | SequenceKind::StoreCredit => month_scope(at),
            SequenceKind::Invoice => year_scope(at),
        }
    }
}

/// `MM/YYYY` scope key.
pub fn month_scope(at: DateTime<Utc>) -> String {
    format!("{:02}/{}", at.month(), at.year())
}

/// `YYYY` scope key.
pub fn year_scope(at: DateTime<Utc>) -> String {
    format!("{}", at.year())
}

// =============================================================================
// Format / Parse
// =============================================================================

/// Formats a sequence number within its scope, e.g. `RCPT004/07/2025`.
pub fn format_number(kind: SequenceKind, seq: i64, scope: &str) -> String {
    format!("{}{:03}/{}", kind.prefix(), seq, scope)
}

/// Recovers the numeric part of a formatted number.
///
/// The numeric part is everything between the fixed-width prefix and the
/// first `/`. Returns `None` for anything that does not parse - callers
/// treat that as "scope empty, restart at 1".
pub fn parse_number(kind: SequenceKind, value: &str) -> Option<i64> {
    let head = value.split('/').next()?;
    let digits = head.strip_prefix(kind.prefix())?;
    let seq: i64 = digits.parse().ok()?;
    if seq < 0 {
        return None;
    }
    Some(seq)
}

/// Reference for a location transfer, e.g. `TR-ABLA-0001-0725`.
///
/// Two-letter codes come from the location names; the trailing part is
/// month+year so references stay scannable in a list.
pub fn transfer_reference(from: &str, to: &str, seq: i64, at: DateTime<Utc>) -> String {
    let code = |name: &str| -> String {
        name.chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(2)
            .collect::<String>()
            .to_ascii_uppercase()
    };
    format!(
        "TR-{}{}-{:04}-{:02}{:02}",
        code(from),
        code(to),
        seq,
        at.month(),
        at.year() % 100
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn july_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_scopes() {
        assert_eq!(month_scope(july_2025()), "07/2025");
        assert_eq!(year_scope(july_2025()), "2025");
        assert_eq!(SequenceKind::Receipt.scope_for(july_2025()), "07/2025");
        assert_eq!(SequenceKind::Invoice.scope_for(july_2025()), "2025");
    }

    #[test]
    fn test_format() {
        assert_eq!(
            format_number(SequenceKind::Receipt, 4, "07/2025"),
            "RCPT004/07/2025"
        );
        assert_eq!(format_number(SequenceKind::Invoice, 12, "2025"), "INV012/2025");
        assert_eq!(
            format_number(SequenceKind::StoreCredit, 3, "07/2025"),
            "SC003/07/2025"
        );
    }

    #[test]
    fn test_format_grows_past_three_digits() {
        assert_eq!(
            format_number(SequenceKind::Receipt, 1234, "07/2025"),
            "RCPT1234/07/2025"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        for seq in [1, 42, 999, 1000, 98765] {
            let formatted = format_number(SequenceKind::Receipt, seq, "07/2025");
            assert_eq!(parse_number(SequenceKind::Receipt, &formatted), Some(seq));
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "RCPT/07/2025", "RCPTxyz/07/2025", "004/07/2025", "INV004/2025"] {
            assert_eq!(parse_number(SequenceKind::Receipt, bad), None, "{bad}");
        }
        // Wrong prefix for the kind
        assert_eq!(parse_number(SequenceKind::Invoice, "RCPT004/07/2025"), None);
    }

    #[test]
    fn test_transfer_reference() {
        assert_eq!(
            transfer_reference("ABUJA", "LAGOS", 1, july_2025()),
            "TR-ABLA-0001-0725"
        );
        assert_eq!(
            transfer_reference("x", "LAGOS", 23, july_2025()),
            "TR-XLA-0023-0725"
        );
    }
}
