//! # Tax Engine
//!
//! Evaluates the set of active tax rules against a taxable base.
//!
//! ## Calculation Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INCLUSIVE TAX (tax already in the price)                               │
//! │    Price ₦10,750 carrying 7.5% VAT                                      │
//! │    tax  = 10,750 − 10,750 / 1.075 = ₦750                                │
//! │    The customer still pays ₦10,750 - the tax is EXTRACTED, not added.   │
//! │                                                                         │
//! │  EXCLUSIVE TAX (tax added on top)                                       │
//! │    Price ₦10,000 plus 7.5% VAT                                          │
//! │    tax  = 10,000 × 0.075 = ₦750                                         │
//! │    The customer pays ₦10,750 - the tax is ADDED to the total.           │
//! │                                                                         │
//! │  FIXED TAX                                                              │
//! │    tax = configured amount regardless of base; the method only decides  │
//! │    whether it is added to the final total.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All amounts are rounded half up at kobo precision. The per-code breakdown
//! is persisted verbatim on the receipt (`Receipt::tax_details`) so the tax
//! report can be reconstructed without re-running any rule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::{Money, Rate};

// =============================================================================
// Tax Rules
// =============================================================================

/// Percentage vs fixed-amount tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TaxKind {
    Percentage,
    Fixed,
}

/// Whether the tax is extracted from, or added to, the taxable base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TaxMethod {
    Inclusive,
    Exclusive,
}

/// The charge side of a tax rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxCharge {
    /// A percentage of the taxable base.
    Percentage(Rate),
    /// A flat amount per receipt.
    Fixed(Money),
}

impl TaxCharge {
    /// Kind discriminant for the persisted breakdown.
    pub fn kind(&self) -> TaxKind {
        match self {
            TaxCharge::Percentage(_) => TaxKind::Percentage,
            TaxCharge::Fixed(_) => TaxKind::Fixed,
        }
    }

    /// Raw configured value: basis points for percentage, kobo for fixed.
    pub fn raw_value(&self) -> i64 {
        match self {
            TaxCharge::Percentage(rate) => rate.bps() as i64,
            TaxCharge::Fixed(amount) => amount.kobo(),
        }
    }
}

/// One active tax rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRule {
    /// Short code, unique among active rules (e.g., "VAT").
    pub code: String,
    /// Display name (e.g., "Value Added Tax").
    pub name: String,
    pub charge: TaxCharge,
    pub method: TaxMethod,
}

impl TaxRule {
    /// Tax amount for this rule over `base`.
    ///
    /// - percentage + inclusive: `base − base/(1 + rate)`
    /// - percentage + exclusive: `base × rate`
    /// - fixed: the configured amount, regardless of method
    pub fn amount_for(&self, base: Money) -> Money {
        match (self.charge, self.method) {
            (TaxCharge::Percentage(rate), TaxMethod::Inclusive) => base.extract_inclusive(rate),
            (TaxCharge::Percentage(rate), TaxMethod::Exclusive) => base.percent_of(rate),
            (TaxCharge::Fixed(amount), _) => amount,
        }
    }
}

// =============================================================================
// Breakdown
// =============================================================================

/// One line of the persisted tax breakdown.
///
/// Serialized shape (stable field names - downstream reports parse this):
/// `{ name, rate, amount, method, type, taxable_amount }`
/// where `rate` is the raw configured value (bps or kobo) and monetary
/// fields are kobo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    pub name: String,
    pub rate: i64,
    #[serde(rename = "amount")]
    pub amount_kobo: i64,
    pub method: TaxMethod,
    #[serde(rename = "type")]
    pub kind: TaxKind,
    #[serde(rename = "taxable_amount")]
    pub taxable_amount_kobo: i64,
}

/// Result of running the active tax rules over a taxable base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxOutcome {
    /// Total tax, inclusive + exclusive.
    pub total: Money,
    /// Tax already inside the price; never added to the grand total.
    pub inclusive: Money,
    /// Tax added on top of the price.
    pub exclusive: Money,
    /// Per-code breakdown. BTreeMap keeps serialization deterministic, so
    /// re-running the pipeline over unchanged inputs is byte-identical.
    pub breakdown: BTreeMap<String, TaxLine>,
}

impl TaxOutcome {
    /// An outcome with no active rules.
    pub fn empty() -> Self {
        TaxOutcome {
            total: Money::zero(),
            inclusive: Money::zero(),
            exclusive: Money::zero(),
            breakdown: BTreeMap::new(),
        }
    }

    /// Serializes the breakdown for persistence on the receipt.
    pub fn breakdown_json(&self) -> String {
        serde_json::to_string(&self.breakdown).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Runs every active rule against `base` and accumulates the totals.
///
/// No active rules is a normal state (tax feature inactive), not an error.
pub fn apply(rules: &[TaxRule], base: Money) -> TaxOutcome {
    let mut outcome = TaxOutcome::empty();

    for rule in rules {
        let amount = rule.amount_for(base);
        outcome.total += amount;
        match rule.method {
            TaxMethod::Inclusive => outcome.inclusive += amount,
            TaxMethod::Exclusive => outcome.exclusive += amount,
        }

        outcome.breakdown.insert(
            rule.code.clone(),
            TaxLine {
                name: rule.name.clone(),
                rate: rule.charge.raw_value(),
                amount_kobo: amount.kobo(),
                method: rule.method,
                kind: rule.charge.kind(),
                taxable_amount_kobo: base.kobo(),
            },
        );
    }

    outcome
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn vat_exclusive() -> TaxRule {
        TaxRule {
            code: "VAT".into(),
            name: "Value Added Tax".into(),
            charge: TaxCharge::Percentage(Rate::from_bps(750)),
            method: TaxMethod::Exclusive,
        }
    }

    fn vat_inclusive() -> TaxRule {
        TaxRule {
            method: TaxMethod::Inclusive,
            ..vat_exclusive()
        }
    }

    #[test]
    fn test_exclusive_percentage() {
        // ₦10,000 base, 7.5% exclusive → ₦750 tax added on top
        let outcome = apply(&[vat_exclusive()], Money::from_naira(10_000));
        assert_eq!(outcome.total, Money::from_naira(750));
        assert_eq!(outcome.exclusive, Money::from_naira(750));
        assert_eq!(outcome.inclusive, Money::zero());
    }

    #[test]
    fn test_inclusive_percentage() {
        // ₦10,750 base carrying 7.5% → ₦750 extracted, nothing added
        let outcome = apply(&[vat_inclusive()], Money::from_naira(10_750));
        assert_eq!(outcome.total, Money::from_naira(750));
        assert_eq!(outcome.inclusive, Money::from_naira(750));
        assert_eq!(outcome.exclusive, Money::zero());
    }

    #[test]
    fn test_fixed_tax_ignores_base() {
        let levy = TaxRule {
            code: "ENV".into(),
            name: "Environmental Levy".into(),
            charge: TaxCharge::Fixed(Money::from_naira(200)),
            method: TaxMethod::Exclusive,
        };
        for base in [Money::zero(), Money::from_naira(5), Money::from_naira(50_000)] {
            let outcome = apply(&[levy.clone()], base);
            assert_eq!(outcome.exclusive, Money::from_naira(200));
        }
    }

    #[test]
    fn test_mixed_rules_split_by_method() {
        let levy = TaxRule {
            code: "LVY".into(),
            name: "Fixed Levy".into(),
            charge: TaxCharge::Fixed(Money::from_naira(100)),
            method: TaxMethod::Inclusive,
        };
        let outcome = apply(&[vat_exclusive(), levy], Money::from_naira(10_000));
        assert_eq!(outcome.exclusive, Money::from_naira(750));
        assert_eq!(outcome.inclusive, Money::from_naira(100));
        assert_eq!(outcome.total, Money::from_naira(850));
        assert_eq!(outcome.breakdown.len(), 2);
    }

    #[test]
    fn test_breakdown_line_fields() {
        let outcome = apply(&[vat_exclusive()], Money::from_naira(10_000));
        let line = &outcome.breakdown["VAT"];
        assert_eq!(line.name, "Value Added Tax");
        assert_eq!(line.rate, 750);
        assert_eq!(line.amount_kobo, Money::from_naira(750).kobo());
        assert_eq!(line.taxable_amount_kobo, Money::from_naira(10_000).kobo());
        assert_eq!(line.kind, TaxKind::Percentage);
    }

    #[test]
    fn test_breakdown_json_is_deterministic() {
        let rules = [vat_exclusive(), vat_inclusive_named("AAA"), vat_inclusive_named("ZZZ")];
        let a = apply(&rules, Money::from_naira(10_000)).breakdown_json();
        let b = apply(&rules, Money::from_naira(10_000)).breakdown_json();
        assert_eq!(a, b);
        // BTreeMap ordering: AAA before VAT before ZZZ
        let aaa = a.find("AAA").unwrap();
        let vat = a.find("VAT").unwrap();
        let zzz = a.find("ZZZ").unwrap();
        assert!(aaa < vat && vat < zzz);
    }

    fn vat_inclusive_named(code: &str) -> TaxRule {
        TaxRule {
            code: code.into(),
            ..vat_inclusive()
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let outcome = apply(&[vat_exclusive()], Money::from_naira(10_000));
        let json = outcome.breakdown_json();
        for key in ["\"name\"", "\"rate\"", "\"amount\"", "\"method\"", "\"type\"", "\"taxable_amount\""] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
        assert!(json.contains("\"exclusive\""));
        assert!(json.contains("\"percentage\""));
    }

    #[test]
    fn test_no_active_rules() {
        let outcome = apply(&[], Money::from_naira(10_000));
        assert_eq!(outcome.total, Money::zero());
        assert_eq!(outcome.breakdown_json(), "{}");
    }
}
