//! # Payment Reconciler
//!
//! Validates that one-or-more tendered payment instruments cover the expected
//! total, and derives the aggregate payment status.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FULL (default)                                                         │
//! │    Σ instruments must equal the grand total within ±1 kobo (absorbs    │
//! │    rounding); anything else is a mismatch naming the difference.       │
//! │                                                                         │
//! │  DEPOSIT (partial payment explicitly enabled)                           │
//! │    Σ instruments < total  → recorded as a deposit, balance tracked     │
//! │    Σ instruments ≥ total  → collapses to a full settlement             │
//! │    Σ instruments = 0      → receipt stays pending, full balance due    │
//! │                                                                         │
//! │  A zero grand total (all-gift sale) needs no instrument at all.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store-credit instruments are validated here for shape only; the FIFO
//! consumption against the customer's credit pool happens in the repository,
//! inside the same transaction.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentStatus, ReceiptPaymentStatus};

/// Reconciliation tolerance: ±1 kobo absorbs percentage rounding.
pub const PAYMENT_TOLERANCE: Money = Money::from_kobo(1);

// =============================================================================
// Instrument Kinds
// =============================================================================

/// The tender types the till accepts.
///
/// Built-in kinds are a closed enum; additional methods configured by the
/// operator arrive as `Custom` and are validated against the allow-list
/// loaded once per transaction - never re-queried per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Cash,
    Card,
    Transfer,
    MobileMoney,
    BankDeposit,
    Cheque,
    /// Debits the customer's store-credit pool instead of an external rail.
    StoreCredit,
    /// Operator-configured method; the code must be on the allow-list.
    Custom(String),
}

impl InstrumentKind {
    /// The persisted method code.
    pub fn code(&self) -> &str {
        match self {
            InstrumentKind::Cash => "cash",
            InstrumentKind::Card => "card",
            InstrumentKind::Transfer => "transfer",
            InstrumentKind::MobileMoney => "mobile_money",
            InstrumentKind::BankDeposit => "bank_deposit",
            InstrumentKind::Cheque => "cheque",
            InstrumentKind::StoreCredit => "store_credit",
            InstrumentKind::Custom(code) => code,
        }
    }

    /// Resolves a method code, accepting custom codes only when allow-listed.
    pub fn from_code(code: &str, allowlist: &[String]) -> CoreResult<Self> {
        let kind = match code {
            "cash" => InstrumentKind::Cash,
            "card" => InstrumentKind::Card,
            "transfer" => InstrumentKind::Transfer,
            "mobile_money" => InstrumentKind::MobileMoney,
            "bank_deposit" => InstrumentKind::BankDeposit,
            "cheque" => InstrumentKind::Cheque,
            "store_credit" => InstrumentKind::StoreCredit,
            custom => {
                if allowlist.iter().any(|allowed| allowed == custom) {
                    InstrumentKind::Custom(custom.to_string())
                } else {
                    return Err(CoreError::UnknownPaymentMethod {
                        code: custom.to_string(),
                    });
                }
            }
        };
        Ok(kind)
    }

    pub fn is_store_credit(&self) -> bool {
        matches!(self, InstrumentKind::StoreCredit)
    }
}

/// One tendered instrument as submitted at the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentDraft {
    pub kind: InstrumentKind,
    pub amount: Money,
    pub reference: Option<String>,
    pub note: Option<String>,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Full settlement vs explicitly-enabled deposit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    Full,
    Deposit,
}

/// What the tendered instruments amount to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Fully settled; paid equals the grand total.
    Settled { paid: Money },
    /// Deposit taken; balance outstanding.
    Deposit { paid: Money, balance: Money },
    /// Nothing tendered (deposit mode); full balance outstanding.
    Pending { balance: Money },
}

impl ReconcileOutcome {
    /// (amount_paid, balance_remaining, receipt status) to persist.
    pub fn receipt_fields(&self) -> (Money, Money, ReceiptPaymentStatus) {
        match *self {
            ReconcileOutcome::Settled { paid } => {
                (paid, Money::zero(), ReceiptPaymentStatus::Paid)
            }
            ReconcileOutcome::Deposit { paid, balance } => {
                (paid, balance, ReceiptPaymentStatus::Partial)
            }
            ReconcileOutcome::Pending { balance } => {
                (Money::zero(), balance, ReceiptPaymentStatus::Pending)
            }
        }
    }
}

/// Validates the tendered instruments against the expected total.
///
/// Every instrument must have a positive amount; the offending index is
/// reported so the cashier can fix that exact row. See the module docs for
/// the mode rules.
pub fn reconcile(
    expected: Money,
    instruments: &[InstrumentDraft],
    mode: SettlementMode,
) -> CoreResult<ReconcileOutcome> {
    for (index, instrument) in instruments.iter().enumerate() {
        if !instrument.amount.is_positive() {
            return Err(CoreError::InvalidInstrumentAmount {
                index,
                amount_kobo: instrument.amount.kobo(),
            });
        }
    }

    let tendered: Money = instruments.iter().map(|i| i.amount).sum();

    // All-gift sale: nothing owed, nothing required.
    if expected.is_zero() && instruments.is_empty() {
        return Ok(ReconcileOutcome::Settled { paid: Money::zero() });
    }

    match mode {
        SettlementMode::Full => {
            if instruments.is_empty() {
                return Err(CoreError::NoPaymentInstrument);
            }
            if tendered.diff(expected) > PAYMENT_TOLERANCE {
                return Err(CoreError::PaymentMismatch {
                    expected_kobo: expected.kobo(),
                    tendered_kobo: tendered.kobo(),
                });
            }
            Ok(ReconcileOutcome::Settled { paid: expected })
        }
        SettlementMode::Deposit => {
            if tendered.is_zero() {
                Ok(ReconcileOutcome::Pending { balance: expected })
            } else if tendered + PAYMENT_TOLERANCE >= expected {
                // Paying the full amount with deposit mode on is just a
                // full settlement.
                Ok(ReconcileOutcome::Settled { paid: expected })
            } else {
                Ok(ReconcileOutcome::Deposit {
                    paid: tendered,
                    balance: expected - tendered,
                })
            }
        }
    }
}

// =============================================================================
// Status Derivation
// =============================================================================

/// Payment status is a pure function of total_paid vs total_amount.
pub fn payment_status_for(total_paid: Money, total: Money) -> PaymentStatus {
    if total_paid + PAYMENT_TOLERANCE >= total {
        PaymentStatus::Completed
    } else if total_paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

/// Receipt payment status from amount paid and remaining balance.
pub fn receipt_status_for(amount_paid: Money, balance: Money) -> ReceiptPaymentStatus {
    if balance <= PAYMENT_TOLERANCE {
        ReceiptPaymentStatus::Paid
    } else if amount_paid.is_positive() {
        ReceiptPaymentStatus::Partial
    } else {
        ReceiptPaymentStatus::Pending
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cash(amount: Money) -> InstrumentDraft {
        InstrumentDraft {
            kind: InstrumentKind::Cash,
            amount,
            reference: None,
            note: None,
        }
    }

    #[test]
    fn test_full_exact_match() {
        let outcome = reconcile(
            Money::from_naira(10_000),
            &[cash(Money::from_naira(6_000)), cash(Money::from_naira(4_000))],
            SettlementMode::Full,
        )
        .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Settled {
                paid: Money::from_naira(10_000)
            }
        );
    }

    #[test]
    fn test_full_within_tolerance() {
        let outcome = reconcile(
            Money::from_kobo(1_000_001),
            &[cash(Money::from_naira(10_000))],
            SettlementMode::Full,
        );
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_full_mismatch_reports_amounts() {
        let err = reconcile(
            Money::from_naira(10_000),
            &[cash(Money::from_naira(9_000))],
            SettlementMode::Full,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::PaymentMismatch {
                expected_kobo: 1_000_000,
                tendered_kobo: 900_000
            }
        ));
    }

    #[test]
    fn test_no_instruments_on_nonzero_total() {
        let err = reconcile(Money::from_naira(100), &[], SettlementMode::Full).unwrap_err();
        assert!(matches!(err, CoreError::NoPaymentInstrument));
    }

    #[test]
    fn test_all_gift_sale_needs_no_instrument() {
        let outcome = reconcile(Money::zero(), &[], SettlementMode::Full).unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Settled {
                paid: Money::zero()
            }
        );
    }

    #[test]
    fn test_zero_or_negative_instrument_rejected() {
        let err = reconcile(
            Money::from_naira(100),
            &[cash(Money::from_naira(100)), cash(Money::zero())],
            SettlementMode::Full,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidInstrumentAmount { index: 1, .. }
        ));
    }

    #[test]
    fn test_deposit_records_balance() {
        let outcome = reconcile(
            Money::from_naira(10_000),
            &[cash(Money::from_naira(3_000))],
            SettlementMode::Deposit,
        )
        .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Deposit {
                paid: Money::from_naira(3_000),
                balance: Money::from_naira(7_000)
            }
        );
    }

    #[test]
    fn test_deposit_covering_total_settles() {
        let outcome = reconcile(
            Money::from_naira(10_000),
            &[cash(Money::from_naira(10_000))],
            SettlementMode::Deposit,
        )
        .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Settled { .. }));
    }

    #[test]
    fn test_deposit_nothing_tendered_is_pending() {
        let outcome = reconcile(Money::from_naira(10_000), &[], SettlementMode::Deposit).unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Pending {
                balance: Money::from_naira(10_000)
            }
        );
    }

    #[test]
    fn test_instrument_kind_codes_round_trip() {
        let allow = vec!["pos_moniepoint".to_string()];
        for code in ["cash", "card", "transfer", "mobile_money", "bank_deposit", "cheque", "store_credit"] {
            let kind = InstrumentKind::from_code(code, &allow).unwrap();
            assert_eq!(kind.code(), code);
        }
        let custom = InstrumentKind::from_code("pos_moniepoint", &allow).unwrap();
        assert_eq!(custom, InstrumentKind::Custom("pos_moniepoint".into()));

        let err = InstrumentKind::from_code("bitcoin", &allow).unwrap_err();
        assert!(matches!(err, CoreError::UnknownPaymentMethod { .. }));
    }

    #[test]
    fn test_status_derivation() {
        let total = Money::from_naira(100);
        assert_eq!(payment_status_for(total, total), PaymentStatus::Completed);
        assert_eq!(
            payment_status_for(Money::from_naira(40), total),
            PaymentStatus::Partial
        );
        assert_eq!(
            payment_status_for(Money::zero(), total),
            PaymentStatus::Pending
        );

        assert_eq!(
            receipt_status_for(total, Money::zero()),
            ReceiptPaymentStatus::Paid
        );
        assert_eq!(
            receipt_status_for(Money::from_naira(40), Money::from_naira(60)),
            ReceiptPaymentStatus::Partial
        );
        assert_eq!(
            receipt_status_for(Money::zero(), total),
            ReceiptPaymentStatus::Pending
        );
    }
}
