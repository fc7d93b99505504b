//! # Request / Response DTOs

use serde::{Deserialize, Serialize};

use sable_core::money::{Money, Rate};
use sable_core::types::ReceiptPaymentStatus;

/// One requested line: a real product or a service charge. "No product" is a
/// variant, not a sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineRequest {
    #[serde(rename_all = "camelCase")]
    Product {
        product_id: String,
        quantity: i64,
        /// Fixed discount for the whole line (not per unit).
        #[serde(default)]
        discount: Money,
        /// Gift lines ring up at zero but still decrement stock.
        #[serde(default)]
        is_gift: bool,
        #[serde(default)]
        gift_reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ServiceCharge { description: String, amount: Money },
}

/// One tendered payment method as submitted at the till. The method code is
/// resolved against the built-in kinds plus the configured allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRequest {
    pub method: String,
    pub amount: Money,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// A checkout: one cart, one customer (optional), one-or-more instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub cashier: Option<String>,
    pub lines: Vec<LineRequest>,
    #[serde(default)]
    pub delivery_cost: Money,
    /// Bill-level discount percentage.
    #[serde(default)]
    pub bill_discount: Rate,
    pub instruments: Vec<InstrumentRequest>,
    /// Deposit mode: instruments may sum to less than the grand total.
    #[serde(default)]
    pub partial_payment: bool,
    /// Loyalty points to redeem against this sale (0 = none).
    #[serde(default)]
    pub redeem_points: i64,
}

/// Per-instrument echo on the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSummary {
    pub method: String,
    pub amount: Money,
    pub reference: Option<String>,
}

/// The committed result of a checkout: the final breakdown plus per-
/// instrument amounts, ready for the cashier display and the printer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub receipt_id: String,
    pub receipt_number: String,
    pub subtotal: Money,
    pub delivery_cost: Money,
    pub discount_amount: Money,
    pub loyalty_discount: Money,
    pub tax_total: Money,
    pub grand_total: Money,
    pub amount_paid: Money,
    pub balance_remaining: Money,
    pub payment_status: ReceiptPaymentStatus,
    pub instruments: Vec<InstrumentSummary>,
    pub points_earned: i64,
    pub points_redeemed: i64,
}

/// Result of a debt settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementOutcome {
    pub receipt_id: String,
    pub receipt_number: String,
    pub amount_settled: Money,
    pub amount_paid: Money,
    pub balance_remaining: Money,
    pub payment_status: ReceiptPaymentStatus,
}
