//! # Loyalty Engine
//!
//! Points accrual, point redemption, and the two count-threshold discount
//! programs.
//!
//! ## Program Families
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POINTS-BASED (per_transaction / per_amount / combined)                 │
//! │    Earn:   points from the transaction total (pre-redemption)          │
//! │    Redeem: points × rate_per_point, capped at max% of the transaction  │
//! │                                                                         │
//! │  COUNT-THRESHOLD (transaction_count / item_count)                       │
//! │    Every qualifying sale bumps a counter; at the threshold a            │
//! │    percentage discount becomes available and the counter resets:        │
//! │      transaction_count → full reset                                     │
//! │      item_count        → modulo reduction (count can overshoot the     │
//! │                          threshold by more than one multiple; the      │
//! │                          discount scales with the multiple, capped     │
//! │                          at an absolute 50%)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A configuration carries exactly ONE family. This module is pure: it
//! decides, the repositories apply. A failed redemption validation therefore
//! cannot touch any balance by construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Money, Rate};
use crate::types::LoyaltyAccount;

/// Absolute ceiling for count-threshold discounts.
pub const COUNT_DISCOUNT_CEILING: Rate = Rate::from_bps(5_000); // 50%

// =============================================================================
// Configuration
// =============================================================================

/// How an active loyalty program rewards customers. Exactly one variant per
/// program; the families are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AccrualRule {
    /// Flat points per transaction, regardless of amount.
    PerTransaction { points: i64 },

    /// Points per currency unit spent (e.g., 1 point per ₦100).
    PerAmount {
        points_per_unit: i64,
        unit_value_kobo: i64,
    },

    /// Both of the above combined.
    Combined {
        points: i64,
        points_per_unit: i64,
        unit_value_kobo: i64,
    },

    /// Non-points: a discount unlocks after N transactions, then the
    /// counter fully resets.
    TransactionCount { required: i64, discount: Rate },

    /// Non-points: a discount unlocks per N items purchased; the percentage
    /// scales linearly with how many multiples of N were reached and the
    /// counter is reduced modulo N.
    ItemCount {
        required: i64,
        discount_per_multiple: Rate,
    },
}

impl AccrualRule {
    /// Whether this rule accrues redeemable points (vs counting).
    pub fn is_points_based(&self) -> bool {
        matches!(
            self,
            AccrualRule::PerTransaction { .. }
                | AccrualRule::PerAmount { .. }
                | AccrualRule::Combined { .. }
        )
    }
}

/// Redemption side of a points-based program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionPolicy {
    /// Currency value of one point, in kobo.
    pub rate_per_point_kobo: i64,

    /// Minimum points a customer must redeem at once.
    pub minimum_points: i64,

    /// Maximum share of the transaction payable with points.
    pub max_discount: Rate,
}

/// An active loyalty program configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyProgram {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub rule: AccrualRule,
    pub redemption: RedemptionPolicy,
}

// =============================================================================
// Accrual
// =============================================================================

/// Points earned for a transaction total.
///
/// The base is the grand total BEFORE any loyalty redemption, so that the
/// points a customer earns are not reduced by the points they spend.
/// Count-threshold rules earn no points.
pub fn points_earned(program: &LoyaltyProgram, transaction_total: Money) -> i64 {
    if !program.is_active {
        return 0;
    }

    let earned = match program.rule {
        AccrualRule::PerTransaction { points } => points,
        AccrualRule::PerAmount {
            points_per_unit,
            unit_value_kobo,
        } => amount_points(transaction_total, points_per_unit, unit_value_kobo),
        AccrualRule::Combined {
            points,
            points_per_unit,
            unit_value_kobo,
        } => points + amount_points(transaction_total, points_per_unit, unit_value_kobo),
        AccrualRule::TransactionCount { .. } | AccrualRule::ItemCount { .. } => 0,
    };

    earned.max(0)
}

/// Whole currency units spent × points per unit, truncated.
fn amount_points(total: Money, points_per_unit: i64, unit_value_kobo: i64) -> i64 {
    if unit_value_kobo <= 0 {
        return 0;
    }
    (total.kobo() as i128 * points_per_unit as i128 / unit_value_kobo as i128) as i64
}

// =============================================================================
// Redemption
// =============================================================================

/// Why a redemption request was rejected. None of these mutate anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedemptionError {
    #[error("loyalty program is not active")]
    ProgramInactive,

    #[error("program does not redeem points")]
    NotPointsBased,

    #[error("{requested} points is below the minimum redemption of {minimum}")]
    BelowMinimum { requested: i64, minimum: i64 },

    #[error("{requested} points requested but balance is {balance}")]
    InsufficientBalance { requested: i64, balance: i64 },

    #[error("discount of {discount_kobo} kobo exceeds the cap of {cap_kobo} kobo")]
    ExceedsCap { discount_kobo: i64, cap_kobo: i64 },

    #[error("discount of {discount_kobo} kobo exceeds the transaction total of {total_kobo} kobo")]
    ExceedsTransaction {
        discount_kobo: i64,
        total_kobo: i64,
    },
}

/// Currency value of a number of points.
pub fn redemption_value(policy: &RedemptionPolicy, points: i64) -> Money {
    Money::from_kobo(points * policy.rate_per_point_kobo)
}

/// Maximum amount of a transaction payable with points.
pub fn max_redeemable(policy: &RedemptionPolicy, transaction_total: Money) -> Money {
    transaction_total.percent_of(policy.max_discount)
}

/// Validates a redemption request and returns the discount it would grant.
///
/// Checks, in order: program active and points-based; minimum redemption;
/// available balance; the max-discount cap; the transaction total itself.
/// Pure - the caller only debits the balance after an `Ok`.
pub fn validate_redemption(
    program: &LoyaltyProgram,
    balance: i64,
    points: i64,
    transaction_total: Money,
) -> Result<Money, RedemptionError> {
    if !program.is_active {
        return Err(RedemptionError::ProgramInactive);
    }
    if !program.rule.is_points_based() {
        return Err(RedemptionError::NotPointsBased);
    }
    if points < program.redemption.minimum_points {
        return Err(RedemptionError::BelowMinimum {
            requested: points,
            minimum: program.redemption.minimum_points,
        });
    }
    if points > balance {
        return Err(RedemptionError::InsufficientBalance {
            requested: points,
            balance,
        });
    }

    let discount = redemption_value(&program.redemption, points);
    let cap = max_redeemable(&program.redemption, transaction_total);
    if discount > cap {
        return Err(RedemptionError::ExceedsCap {
            discount_kobo: discount.kobo(),
            cap_kobo: cap.kobo(),
        });
    }
    if discount > transaction_total {
        return Err(RedemptionError::ExceedsTransaction {
            discount_kobo: discount.kobo(),
            total_kobo: transaction_total.kobo(),
        });
    }

    Ok(discount)
}

// =============================================================================
// Count-Threshold Discounts
// =============================================================================

/// How to reset the account counter after a count discount is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterReset {
    /// transaction_count goes back to zero.
    TransactionCount,
    /// item_count is reduced modulo the threshold; the overshoot carries.
    ItemCount { remainder: i64 },
}

/// A count-threshold discount that is ready to be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountDiscount {
    pub discount: Rate,
    pub reset: CounterReset,
}

/// Checks whether the account has earned a count-threshold discount.
///
/// Returns the discount to apply as the bill-level percentage plus the
/// counter reset to persist alongside it. Points-based programs never
/// produce one.
pub fn count_discount(program: &LoyaltyProgram, account: &LoyaltyAccount) -> Option<CountDiscount> {
    if !program.is_active || !account.is_active {
        return None;
    }

    match program.rule {
        AccrualRule::TransactionCount { required, discount } => {
            if required > 0 && account.transaction_count >= required {
                Some(CountDiscount {
                    discount,
                    reset: CounterReset::TransactionCount,
                })
            } else {
                None
            }
        }
        AccrualRule::ItemCount {
            required,
            discount_per_multiple,
        } => {
            if required > 0 && account.item_count >= required {
                let multiplier = account.item_count / required;
                Some(CountDiscount {
                    discount: discount_per_multiple
                        .multiply(multiplier)
                        .min(COUNT_DISCOUNT_CEILING),
                    reset: CounterReset::ItemCount {
                        remainder: account.item_count % required,
                    },
                })
            } else {
                None
            }
        }
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn points_program(rule: AccrualRule) -> LoyaltyProgram {
        LoyaltyProgram {
            id: "lp1".into(),
            name: "Rewards".into(),
            is_active: true,
            rule,
            redemption: RedemptionPolicy {
                rate_per_point_kobo: 100, // ₦1 per point
                minimum_points: 100,
                max_discount: Rate::from_bps(2_000), // 20%
            },
        }
    }

    fn account(balance: i64, txns: i64, items: i64) -> LoyaltyAccount {
        LoyaltyAccount {
            id: "a1".into(),
            customer_id: "c1".into(),
            current_balance: balance,
            total_earned: balance,
            total_redeemed: 0,
            transaction_count: txns,
            item_count: items,
            discount_count: 0,
            is_active: true,
            enrolled_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_accrual_per_transaction() {
        let program = points_program(AccrualRule::PerTransaction { points: 5 });
        assert_eq!(points_earned(&program, Money::from_naira(10)), 5);
        assert_eq!(points_earned(&program, Money::from_naira(1_000_000)), 5);
    }

    #[test]
    fn test_accrual_per_amount_truncates() {
        // 1 point per ₦100
        let program = points_program(AccrualRule::PerAmount {
            points_per_unit: 1,
            unit_value_kobo: 10_000,
        });
        assert_eq!(points_earned(&program, Money::from_naira(150)), 1);
        assert_eq!(points_earned(&program, Money::from_naira(10_000)), 100);
        assert_eq!(points_earned(&program, Money::from_naira(99)), 0);
    }

    #[test]
    fn test_accrual_combined() {
        let program = points_program(AccrualRule::Combined {
            points: 2,
            points_per_unit: 1,
            unit_value_kobo: 10_000,
        });
        assert_eq!(points_earned(&program, Money::from_naira(500)), 7);
    }

    #[test]
    fn test_count_rules_earn_no_points() {
        let program = points_program(AccrualRule::TransactionCount {
            required: 10,
            discount: Rate::from_bps(1_000),
        });
        assert_eq!(points_earned(&program, Money::from_naira(10_000)), 0);
    }

    /// Redeeming 500 points at ₦1/point against a ₦10,000 transaction with a
    /// 20% cap (₦2,000) is allowed; 3,000 points (₦3,000) exceeds the cap
    /// and must be rejected without touching anything.
    #[test]
    fn test_redemption_cap() {
        let program = points_program(AccrualRule::PerTransaction { points: 1 });
        let total = Money::from_naira(10_000);

        let ok = validate_redemption(&program, 5_000, 500, total);
        assert_eq!(ok, Ok(Money::from_naira(500)));

        let rejected = validate_redemption(&program, 5_000, 3_000, total);
        assert_eq!(
            rejected,
            Err(RedemptionError::ExceedsCap {
                discount_kobo: Money::from_naira(3_000).kobo(),
                cap_kobo: Money::from_naira(2_000).kobo(),
            })
        );
    }

    #[test]
    fn test_redemption_below_minimum() {
        let program = points_program(AccrualRule::PerTransaction { points: 1 });
        let err = validate_redemption(&program, 5_000, 50, Money::from_naira(10_000));
        assert_eq!(
            err,
            Err(RedemptionError::BelowMinimum {
                requested: 50,
                minimum: 100
            })
        );
    }

    #[test]
    fn test_redemption_insufficient_balance() {
        let program = points_program(AccrualRule::PerTransaction { points: 1 });
        let err = validate_redemption(&program, 200, 400, Money::from_naira(10_000));
        assert_eq!(
            err,
            Err(RedemptionError::InsufficientBalance {
                requested: 400,
                balance: 200
            })
        );
    }

    #[test]
    fn test_redemption_exceeds_transaction() {
        // Cap of 100% so the transaction-total check is the binding one
        let mut program = points_program(AccrualRule::PerTransaction { points: 1 });
        program.redemption.max_discount = Rate::FULL;
        let err = validate_redemption(&program, 10_000, 600, Money::from_naira(500));
        assert!(matches!(err, Err(RedemptionError::ExceedsTransaction { .. })));
    }

    #[test]
    fn test_transaction_count_discount_full_reset() {
        let program = points_program(AccrualRule::TransactionCount {
            required: 10,
            discount: Rate::from_bps(1_000),
        });
        assert_eq!(count_discount(&program, &account(0, 9, 0)), None);

        let hit = count_discount(&program, &account(0, 10, 0)).unwrap();
        assert_eq!(hit.discount, Rate::from_bps(1_000));
        assert_eq!(hit.reset, CounterReset::TransactionCount);
    }

    #[test]
    fn test_item_count_discount_scales_and_carries_remainder() {
        // 5% per 20 items
        let program = points_program(AccrualRule::ItemCount {
            required: 20,
            discount_per_multiple: Rate::from_bps(500),
        });

        // 47 items = 2 multiples + 7 carried over
        let hit = count_discount(&program, &account(0, 0, 47)).unwrap();
        assert_eq!(hit.discount, Rate::from_bps(1_000));
        assert_eq!(hit.reset, CounterReset::ItemCount { remainder: 7 });
    }

    #[test]
    fn test_item_count_discount_ceiling() {
        let program = points_program(AccrualRule::ItemCount {
            required: 10,
            discount_per_multiple: Rate::from_bps(500),
        });
        // 200 items = 20 multiples = 100% uncapped → clamped to 50%
        let hit = count_discount(&program, &account(0, 0, 200)).unwrap();
        assert_eq!(hit.discount, COUNT_DISCOUNT_CEILING);
    }

    #[test]
    fn test_inactive_program_rejects_everything() {
        let mut program = points_program(AccrualRule::PerTransaction { points: 5 });
        program.is_active = false;
        assert_eq!(points_earned(&program, Money::from_naira(100)), 0);
        assert_eq!(
            validate_redemption(&program, 1_000, 500, Money::from_naira(10_000)),
            Err(RedemptionError::ProgramInactive)
        );
        assert_eq!(count_discount(&program, &account(0, 50, 50)), None);
    }
}
