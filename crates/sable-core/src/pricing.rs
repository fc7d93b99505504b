//! # Pricing Pipeline
//!
//! Turns line totals + delivery + discounts + taxes into the persisted price
//! breakdown. Deterministic and always executed in this exact order -
//! reordering changes the financial result and is a defect, not a style
//! choice:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. items_subtotal        = Σ line.total   (gift lines contribute 0)   │
//! │  2. subtotal_with_delivery = items_subtotal + delivery_cost            │
//! │  3. discount_amount        = subtotal_with_delivery × bill_discount%   │
//! │  4. amount_after_discount  = subtotal_with_delivery − discount_amount  │
//! │  5. amount_after_discount −= loyalty_discount   (validated by caller)  │
//! │  6. taxable_base           = amount_after_discount − delivery_cost     │
//! │                              (delivery is never taxed)                 │
//! │  7. tax                    = TaxEngine(active_rules, taxable_base)     │
//! │  8. grand_total            = amount_after_discount + exclusive_tax     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline is a pure function: whenever a line is added/removed/changed
//! or the bill discount changes, callers re-run it in full and overwrite the
//! receipt's persisted fields. Nothing is ever patched incrementally - stale
//! partial sums are how double-discount bugs happen.

use serde::{Deserialize, Serialize};

use crate::money::{Money, Rate};
use crate::tax::{self, TaxOutcome, TaxRule};

// =============================================================================
// Line Totals
// =============================================================================

/// Priced values for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePricing {
    /// Line total after discount; zero for gift lines.
    pub total: Money,
    /// Discount actually applied (clamped to the line total).
    pub discount: Money,
    /// Pre-gift value, kept for reporting. `None` for regular lines.
    pub original_value: Option<Money>,
}

/// Computes one line's total.
///
/// The discount is fixed per LINE, not per unit, and is clamped so the line
/// can never go negative. Gift lines are forced to zero but remember what
/// they were worth.
pub fn line_total(unit_price: Money, quantity: i64, discount: Money, is_gift: bool) -> LinePricing {
    let gross = unit_price.multiply_quantity(quantity);
    let discount = if discount > gross { gross } else { discount.floor_zero() };
    let net = gross - discount;

    if is_gift {
        LinePricing {
            total: Money::zero(),
            discount,
            original_value: Some(net),
        }
    } else {
        LinePricing {
            total: net,
            discount,
            original_value: None,
        }
    }
}

// =============================================================================
// Receipt Breakdown
// =============================================================================

/// The full output of one pipeline run. Persisted onto the receipt in a
/// single write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items_subtotal: Money,
    pub delivery_cost: Money,
    pub subtotal_with_delivery: Money,
    pub bill_discount: Rate,
    pub discount_amount: Money,
    pub loyalty_discount: Money,
    pub amount_after_discount: Money,
    pub taxable_base: Money,
    pub tax: TaxOutcome,
    pub grand_total: Money,
}

/// Runs the pipeline over the given line totals.
///
/// `loyalty_discount` must already be validated (or zeroed after a rejected
/// redemption) - this function subtracts it blindly at step 5 so that tax at
/// step 7 is computed on the post-redemption base.
pub fn price_receipt(
    line_totals: &[Money],
    delivery_cost: Money,
    bill_discount: Rate,
    loyalty_discount: Money,
    active_taxes: &[TaxRule],
) -> PriceBreakdown {
    // 1-2: subtotal, then delivery
    let items_subtotal: Money = line_totals.iter().copied().sum();
    let subtotal_with_delivery = items_subtotal + delivery_cost;

    // 3-4: bill-level discount (distinct from per-line discounts already
    // baked into the line totals)
    let discount_amount = subtotal_with_delivery.percent_of(bill_discount);
    let mut amount_after_discount = subtotal_with_delivery - discount_amount;

    // 5: loyalty redemption, before tax
    amount_after_discount -= loyalty_discount;

    // 6: delivery is never taxed
    let taxable_base = (amount_after_discount - delivery_cost).floor_zero();

    // 7: all active tax rules over the taxable base
    let tax = tax::apply(active_taxes, taxable_base);

    // 8: inclusive tax is already inside the price - only exclusive is added
    let grand_total = amount_after_discount + tax.exclusive;

    PriceBreakdown {
        items_subtotal,
        delivery_cost,
        subtotal_with_delivery,
        bill_discount,
        discount_amount,
        loyalty_discount,
        amount_after_discount,
        taxable_base,
        tax,
        grand_total,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::{TaxCharge, TaxMethod};

    fn vat(method: TaxMethod) -> TaxRule {
        TaxRule {
            code: "VAT".into(),
            name: "Value Added Tax".into(),
            charge: TaxCharge::Percentage(Rate::from_bps(750)),
            method,
        }
    }

    #[test]
    fn test_line_total_clamps_discount() {
        let pricing = line_total(Money::from_naira(100), 2, Money::from_naira(500), false);
        assert_eq!(pricing.total, Money::zero());
        assert_eq!(pricing.discount, Money::from_naira(200));
    }

    #[test]
    fn test_line_discount_is_per_line_not_per_unit() {
        let pricing = line_total(Money::from_naira(100), 3, Money::from_naira(30), false);
        assert_eq!(pricing.total, Money::from_naira(270));
    }

    #[test]
    fn test_gift_line_is_zero_but_remembers_value() {
        let pricing = line_total(Money::from_naira(5_000), 1, Money::zero(), true);
        assert_eq!(pricing.total, Money::zero());
        assert_eq!(pricing.original_value, Some(Money::from_naira(5_000)));
    }

    /// Cart subtotal ₦10,000, one exclusive 7.5% tax, no discounts
    /// → tax ₦750, grand total ₦10,750.
    #[test]
    fn test_exclusive_tax_added_on_top() {
        let breakdown = price_receipt(
            &[Money::from_naira(10_000)],
            Money::zero(),
            Rate::zero(),
            Money::zero(),
            &[vat(TaxMethod::Exclusive)],
        );
        assert_eq!(breakdown.tax.total, Money::from_naira(750));
        assert_eq!(breakdown.grand_total, Money::from_naira(10_750));
    }

    /// Price ₦10,750 with one inclusive 7.5% tax → ₦750 extracted, grand
    /// total stays ₦10,750 (the tax is not added again).
    #[test]
    fn test_inclusive_tax_not_added_again() {
        let breakdown = price_receipt(
            &[Money::from_naira(10_750)],
            Money::zero(),
            Rate::zero(),
            Money::zero(),
            &[vat(TaxMethod::Inclusive)],
        );
        assert_eq!(breakdown.tax.total, Money::from_naira(750));
        assert_eq!(breakdown.tax.exclusive, Money::zero());
        assert_eq!(breakdown.grand_total, Money::from_naira(10_750));
    }

    #[test]
    fn test_delivery_is_never_taxed() {
        let breakdown = price_receipt(
            &[Money::from_naira(10_000)],
            Money::from_naira(2_000),
            Rate::zero(),
            Money::zero(),
            &[vat(TaxMethod::Exclusive)],
        );
        // Tax on the items only, not on the ₦2,000 delivery
        assert_eq!(breakdown.taxable_base, Money::from_naira(10_000));
        assert_eq!(breakdown.tax.total, Money::from_naira(750));
        assert_eq!(breakdown.grand_total, Money::from_naira(12_750));
    }

    #[test]
    fn test_bill_discount_applies_before_tax() {
        // 10% off ₦10,000 → taxable ₦9,000 → tax ₦675 → total ₦9,675
        let breakdown = price_receipt(
            &[Money::from_naira(10_000)],
            Money::zero(),
            Rate::from_bps(1_000),
            Money::zero(),
            &[vat(TaxMethod::Exclusive)],
        );
        assert_eq!(breakdown.discount_amount, Money::from_naira(1_000));
        assert_eq!(breakdown.taxable_base, Money::from_naira(9_000));
        assert_eq!(breakdown.grand_total, Money::from_naira(9_675));
    }

    #[test]
    fn test_loyalty_discount_reduces_taxable_base() {
        let breakdown = price_receipt(
            &[Money::from_naira(10_000)],
            Money::zero(),
            Rate::zero(),
            Money::from_naira(500),
            &[vat(TaxMethod::Exclusive)],
        );
        assert_eq!(breakdown.taxable_base, Money::from_naira(9_500));
        assert_eq!(
            breakdown.grand_total,
            Money::from_naira(9_500) + Money::from_kobo(71_250)
        );
    }

    #[test]
    fn test_order_delivery_then_discount() {
        // The bill discount applies to subtotal INCLUDING delivery (step 3
        // runs after step 2): 10% of ₦12,000 = ₦1,200.
        let breakdown = price_receipt(
            &[Money::from_naira(10_000)],
            Money::from_naira(2_000),
            Rate::from_bps(1_000),
            Money::zero(),
            &[],
        );
        assert_eq!(breakdown.discount_amount, Money::from_naira(1_200));
        assert_eq!(breakdown.amount_after_discount, Money::from_naira(10_800));
    }

    #[test]
    fn test_empty_receipt_prices_to_zero() {
        let breakdown = price_receipt(&[], Money::zero(), Rate::zero(), Money::zero(), &[]);
        assert_eq!(breakdown.grand_total, Money::zero());
    }

    /// Re-running the pipeline on unchanged inputs yields byte-identical
    /// output (including the serialized tax breakdown).
    #[test]
    fn test_idempotent_repricing() {
        let lines = [Money::from_naira(4_000), Money::from_naira(6_000)];
        let taxes = [vat(TaxMethod::Exclusive), vat_named("AAA"), vat_named("ZZZ")];
        let run = || {
            price_receipt(
                &lines,
                Money::from_naira(1_500),
                Rate::from_bps(500),
                Money::from_naira(200),
                &taxes,
            )
        };
        let a = run();
        let b = run();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.tax.breakdown_json(), b.tax.breakdown_json());
    }

    fn vat_named(code: &str) -> TaxRule {
        TaxRule {
            code: code.into(),
            ..vat(TaxMethod::Inclusive)
        }
    }
}
