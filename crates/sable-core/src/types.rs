//! # Domain Types
//!
//! Core domain types used throughout Sable POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Receipt      │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  receipt_number │   │  receipt_id (FK)│       │
//! │  │  brand          │   │  subtotal_kobo  │   │  total_kobo     │       │
//! │  │  quantity       │   │  tax_details    │   │  status         │       │
//! │  │  selling_price  │   │  payment_status │   └────────┬────────┘       │
//! │  └─────────────────┘   └────────┬────────┘            │                │
//! │                                 │                     │                │
//! │                        ┌────────┴────────┐   ┌────────┴──────────┐     │
//! │                        │    SaleLine     │   │ PaymentInstrument │     │
//! │                        │ (product|service│   │ (cash, card,      │     │
//! │                        │  snapshot, gift)│   │  store credit...) │     │
//! │                        └─────────────────┘   └───────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (receipt_number, credit_number, etc.) -
//!   human-readable, period-scoped, allocated by the sequence allocator
//!
//! ## Monetary Fields
//! All monetary columns are i64 kobo with `Money` accessors; this keeps the
//! persisted structs trivially mappable to SQLite rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::{Money, Rate};
use crate::tax::TaxLine;

// =============================================================================
// Product
// =============================================================================

/// How a product's markup is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MarkupKind {
    /// Markup is a percentage of cost (value stored in basis points).
    Percentage,
    /// Markup is a fixed amount added to cost (value stored in kobo).
    Fixed,
}

/// Which zone of a location a product sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ShopZone {
    /// Shop floor - sellable stock.
    Store,
    /// Warehouse - held stock, not offered at the till.
    Warehouse,
}

/// A product available for sale.
///
/// ## Invariants
/// - `quantity >= 0` always (enforced by the atomic conditional decrement
///   plus a CHECK constraint)
/// - `selling_price_kobo` is always re-derived from cost + markup whenever
///   either changes; it is never hand-set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Brand / display name shown to the cashier and on the receipt.
    pub brand: String,

    /// Product category (e.g., "shoes", "bags").
    pub category: String,

    /// Unit cost price in kobo.
    pub cost_price_kobo: i64,

    /// How the markup value is interpreted.
    pub markup_kind: MarkupKind,

    /// Markup value: basis points for percentage, kobo for fixed.
    pub markup_value: i64,

    /// Derived selling price in kobo.
    pub selling_price_kobo: i64,

    /// On-hand quantity at this location/zone.
    pub quantity: i64,

    /// Physical location (e.g., "ABUJA", "LAGOS").
    pub location: String,

    /// Zone within the location.
    pub shop_zone: ShopZone,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the cost price as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_kobo(self.cost_price_kobo)
    }

    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_kobo(self.selling_price_kobo)
    }

    /// Derives the selling price from cost + markup.
    ///
    /// Called by the repository whenever cost or markup changes; the stored
    /// `selling_price_kobo` must always equal this.
    pub fn derive_selling_price(&self) -> Money {
        derive_selling_price(self.cost_price(), self.markup_kind, self.markup_value)
    }
}

/// Selling price = cost + markup (percentage of cost, or fixed amount).
pub fn derive_selling_price(cost: Money, kind: MarkupKind, value: i64) -> Money {
    match kind {
        MarkupKind::Percentage => cost + cost.percent_of(Rate::from_bps(value as u32)),
        MarkupKind::Fixed => cost + Money::from_kobo(value),
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer record (consumed from the customer store).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Receipt
// =============================================================================

/// Payment state of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ReceiptPaymentStatus {
    /// Nothing paid yet.
    Pending,
    /// Deposit taken, balance outstanding.
    Partial,
    /// Fully settled.
    Paid,
}

/// The durable financial record of one sale.
///
/// ## Invariants
/// - `amount_paid + balance_remaining == grand_total` (±1 kobo) after every
///   mutation
/// - `grand_total_kobo` is always the output of a full pricing-pipeline run
///   over the current lines; it is never patched incrementally
/// - `tax_details` is the serialized breakdown from that same run, persisted
///   verbatim for audit and reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Receipt {
    pub id: String,

    /// Sequential human-readable number, e.g. `RCPT004/07/2025`.
    /// Unique and contiguous-from-1 within its month scope.
    pub receipt_number: String,

    pub customer_id: Option<String>,

    /// Cashier who rang the sale.
    pub cashier: Option<String>,

    /// Items subtotal in kobo (before delivery, discount, tax).
    pub subtotal_kobo: i64,

    /// Total tax in kobo (inclusive + exclusive).
    pub tax_kobo: i64,

    /// JSON breakdown keyed by tax code (see [`TaxLine`]).
    pub tax_details: String,

    pub delivery_kobo: i64,

    /// Loyalty points discount applied, in kobo.
    pub loyalty_discount_kobo: i64,

    /// Number of loyalty points redeemed against this receipt.
    pub loyalty_points_redeemed: i64,

    /// Grand total in kobo: amount after discounts plus exclusive tax.
    pub grand_total_kobo: i64,

    /// Total paid so far, in kobo.
    pub amount_paid_kobo: i64,

    /// Remaining balance, in kobo. Floored at zero.
    pub balance_remaining_kobo: i64,

    pub payment_status: ReceiptPaymentStatus,

    pub created_at: DateTime<Utc>,
}

impl Receipt {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_kobo(self.subtotal_kobo)
    }

    #[inline]
    pub fn tax_amount(&self) -> Money {
        Money::from_kobo(self.tax_kobo)
    }

    #[inline]
    pub fn delivery_cost(&self) -> Money {
        Money::from_kobo(self.delivery_kobo)
    }

    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_kobo(self.grand_total_kobo)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_kobo(self.amount_paid_kobo)
    }

    #[inline]
    pub fn balance_remaining(&self) -> Money {
        Money::from_kobo(self.balance_remaining_kobo)
    }

    /// Parses the persisted tax breakdown.
    ///
    /// A malformed or empty payload yields an empty map, never an error -
    /// a receipt with unreadable tax details must still render.
    pub fn tax_breakdown(&self) -> BTreeMap<String, TaxLine> {
        serde_json::from_str(&self.tax_details).unwrap_or_default()
    }

    /// Sum of inclusive tax lines (already inside the price).
    pub fn inclusive_tax_total(&self) -> Money {
        self.tax_breakdown()
            .values()
            .filter(|line| line.method == crate::tax::TaxMethod::Inclusive)
            .map(|line| Money::from_kobo(line.amount_kobo))
            .sum()
    }

    /// Sum of exclusive tax lines (added on top of the price).
    pub fn exclusive_tax_total(&self) -> Money {
        self.tax_breakdown()
            .values()
            .filter(|line| line.method == crate::tax::TaxMethod::Exclusive)
            .map(|line| Money::from_kobo(line.amount_kobo))
            .sum()
    }

    /// Grand total minus the exclusive tax that was added on top.
    pub fn amount_before_tax(&self) -> Money {
        self.grand_total() - self.exclusive_tax_total()
    }

    /// The must-balance invariant: paid + remaining == grand total (±1 kobo).
    pub fn balances(&self) -> bool {
        (self.amount_paid() + self.balance_remaining())
            .diff(self.grand_total())
            .kobo()
            <= 1
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// Discriminates product lines from service-charge lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// A physical product; decrements stock.
    Product,
    /// A service charge (delivery fitting, repairs...); no stock movement.
    Service,
}

/// A line item on a receipt.
/// Uses the snapshot pattern to freeze product data at time of sale.
///
/// ## Invariants
/// - `total_kobo = unit_price * quantity − discount`, with the discount
///   clamped so it never exceeds the line total
/// - Gift lines force `total_kobo` to zero, keep `original_value_kobo` for
///   reporting, and still decrement stock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub receipt_id: String,
    pub payment_id: String,
    pub kind: LineKind,

    /// Product reference; `None` for service-charge lines.
    pub product_id: Option<String>,

    /// Description at time of sale (brand for products, free text for
    /// service charges). Frozen.
    pub description: String,

    /// Unit price in kobo at time of sale. Frozen.
    pub unit_price_kobo: i64,

    pub quantity: i64,

    /// Fixed discount for the whole line (not per unit), in kobo.
    pub discount_kobo: i64,

    /// Line total in kobo after discount (zero for gifts).
    pub total_kobo: i64,

    pub is_gift: bool,
    pub gift_reason: Option<String>,

    /// Pre-gift value in kobo, preserved for reporting.
    pub original_value_kobo: Option<i64>,

    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_kobo(self.unit_price_kobo)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_kobo(self.total_kobo)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// Aggregate payment state, a pure function of total_paid vs total_amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
    Failed,
}

/// The payment container for a receipt. Exactly one per receipt (enforced by
/// a UNIQUE constraint); it aggregates the individual tendered instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub receipt_id: String,
    pub status: PaymentStatus,

    /// Amount owed, in kobo. Mirrors the receipt's grand total.
    pub total_kobo: i64,

    /// Sum of completed instruments, in kobo.
    pub total_paid_kobo: i64,

    pub balance_due_kobo: i64,

    /// Bill-level discount percentage in basis points.
    pub discount_bps: i64,

    /// Bill-level discount amount in kobo (derived from discount_bps).
    pub discount_kobo: i64,

    /// Loyalty points discount in kobo.
    pub loyalty_discount_kobo: i64,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_kobo(self.total_kobo)
    }

    #[inline]
    pub fn total_paid(&self) -> Money {
        Money::from_kobo(self.total_paid_kobo)
    }

    #[inline]
    pub fn discount_rate(&self) -> Rate {
        Rate::from_bps(self.discount_bps as u32)
    }
}

/// Lifecycle state of a single tendered instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum InstrumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// One tendered payment method within a payment.
///
/// Invariant: sum of completed instrument amounts never exceeds the
/// payment's total by more than the reconciliation tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentInstrument {
    pub id: String,
    pub payment_id: String,

    /// Method code ("cash", "card", "store_credit", or a configured custom
    /// code). Validated against the allow-list at checkout time.
    pub method: String,

    /// Amount in kobo. Always positive.
    pub amount_kobo: i64,

    pub status: InstrumentStatus,

    /// Transaction reference, terminal slip number, etc.
    pub reference: Option<String>,

    pub note: Option<String>,

    pub processed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl PaymentInstrument {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_kobo(self.amount_kobo)
    }
}

// =============================================================================
// Partial Payment Ledger
// =============================================================================

/// One deposit/installment entry for a receipt.
/// Append-only; never mutated or deleted once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PartialPayment {
    pub id: String,
    pub receipt_id: String,
    pub amount_kobo: i64,
    pub method: String,
    pub received_by: Option<String>,
    pub note: Option<String>,
    pub paid_at: DateTime<Utc>,
}

impl PartialPayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_kobo(self.amount_kobo)
    }
}

// =============================================================================
// Loyalty
// =============================================================================

/// A customer's loyalty points account.
///
/// ## Invariants
/// - `current_balance == total_earned − total_redeemed`, for all time,
///   including after rejected redemptions (which change nothing)
/// - Every balance change pairs with exactly one [`LoyaltyTransaction`] row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LoyaltyAccount {
    pub id: String,
    pub customer_id: String,
    pub current_balance: i64,
    pub total_earned: i64,
    pub total_redeemed: i64,

    /// Counter for the transaction-count discount program.
    pub transaction_count: i64,

    /// Counter for the item-count discount program.
    pub item_count: i64,

    /// How many times a count-threshold discount has been consumed.
    pub discount_count: i64,

    pub is_active: bool,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyAccount {
    /// Points conservation: balance must equal earned minus redeemed.
    pub fn conserves_points(&self) -> bool {
        self.current_balance == self.total_earned - self.total_redeemed
    }
}

/// Direction of a loyalty ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTxnKind {
    Earned,
    Redeemed,
    Adjusted,
}

/// Immutable audit row for one loyalty balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LoyaltyTransaction {
    pub id: String,
    pub account_id: String,
    pub kind: LoyaltyTxnKind,

    /// Points delta for this entry (always positive; kind carries direction).
    pub points: i64,

    /// Account balance after this entry was applied.
    pub balance_after: i64,

    /// Currency value of the points at transaction time, in kobo.
    pub monetary_value_kobo: Option<i64>,

    pub receipt_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Store Credit
// =============================================================================

/// A store credit issued to a customer (from a return or goodwill).
///
/// Invariant: `remaining_balance == original_amount − Σ usage.amount_used`,
/// never negative. Consumed oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoreCredit {
    pub id: String,

    /// Sequential number, e.g. `SC012/07/2025`.
    pub credit_number: String,

    pub customer_id: String,
    pub original_kobo: i64,
    pub remaining_kobo: i64,
    pub is_active: bool,
    pub issued_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl StoreCredit {
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_kobo(self.remaining_kobo)
    }
}

/// Immutable consumption record against one store credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoreCreditUsage {
    pub id: String,
    pub credit_id: String,
    pub receipt_id: String,
    pub amount_kobo: i64,
    pub used_at: DateTime<Utc>,
}

// =============================================================================
// Location Transfers
// =============================================================================

/// State of an inventory movement between locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InTransit,
    Received,
    Cancelled,
    Completed,
}

/// Header for an inventory movement between locations/zones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocationTransfer {
    pub id: String,

    /// Reference like `TR-ABLA-0001-0725`.
    pub reference: String,

    pub from_location: String,
    pub to_location: String,
    pub status: TransferStatus,
    pub note: Option<String>,
    pub total_items: i64,
    pub total_value_kobo: i64,
    pub created_at: DateTime<Utc>,
}

/// One product movement inside a transfer. Deducts from the source product
/// and credits the destination product as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransferItem {
    pub id: String,
    pub transfer_id: String,
    pub from_product_id: String,
    pub to_product_id: String,
    pub quantity: i64,
    pub unit_price_kobo: i64,
}

impl TransferItem {
    /// Value moved by this item.
    #[inline]
    pub fn total_value(&self) -> Money {
        Money::from_kobo(self.unit_price_kobo * self.quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt_with(paid: i64, remaining: i64, total: i64) -> Receipt {
        Receipt {
            id: "r1".into(),
            receipt_number: "RCPT001/07/2025".into(),
            customer_id: None,
            cashier: None,
            subtotal_kobo: total,
            tax_kobo: 0,
            tax_details: "{}".into(),
            delivery_kobo: 0,
            loyalty_discount_kobo: 0,
            loyalty_points_redeemed: 0,
            grand_total_kobo: total,
            amount_paid_kobo: paid,
            balance_remaining_kobo: remaining,
            payment_status: ReceiptPaymentStatus::Partial,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_invariant() {
        assert!(receipt_with(300_000, 700_000, 1_000_000).balances());
        assert!(receipt_with(300_000, 700_001, 1_000_000).balances()); // ±1 kobo
        assert!(!receipt_with(300_000, 600_000, 1_000_000).balances());
    }

    #[test]
    fn test_tax_breakdown_tolerates_garbage() {
        let mut r = receipt_with(0, 0, 0);
        r.tax_details = "not json".into();
        assert!(r.tax_breakdown().is_empty());
        assert_eq!(r.inclusive_tax_total(), Money::zero());
    }

    #[test]
    fn test_derive_selling_price() {
        // 25% markup on ₦8,000 cost → ₦10,000
        let price = derive_selling_price(Money::from_naira(8_000), MarkupKind::Percentage, 2_500);
        assert_eq!(price, Money::from_naira(10_000));

        // Fixed ₦1,500 markup
        let price = derive_selling_price(Money::from_naira(8_000), MarkupKind::Fixed, 150_000);
        assert_eq!(price, Money::from_naira(9_500));
    }

    #[test]
    fn test_points_conservation() {
        let account = LoyaltyAccount {
            id: "a1".into(),
            customer_id: "c1".into(),
            current_balance: 400,
            total_earned: 1000,
            total_redeemed: 600,
            transaction_count: 0,
            item_count: 0,
            discount_count: 0,
            is_active: true,
            enrolled_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(account.conserves_points());
    }
}
