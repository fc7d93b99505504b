//! # sable-core: Pure Business Logic for Sable POS
//!
//! This crate is the **heart** of the Sable POS transaction engine. It
//! contains all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sable POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    sable-engine (Use Cases)                     │   │
//! │  │    checkout, settlement, recalculation, transfers, sinks        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ sable-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │    tax    │  │  loyalty  │  │  pricing  │  │   │
//! │  │   │ Money/Rate│  │ incl/excl │  │ points +  │  │ the fixed │  │   │
//! │  │   │ half-up   │  │ breakdown │  │ counters  │  │  pipeline │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                 │   │
//! │  │   │ reconcile │  │ sequence  │  │   types   │                 │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    sable-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` (integer kobo) and `Rate` (basis points); half-up
//!   rounding policy
//! - [`types`] - Domain types (Product, Receipt, SaleLine, Payment, loyalty
//!   and store-credit entities, transfers)
//! - [`tax`] - Inclusive/exclusive percentage and fixed taxes with a
//!   persisted per-code breakdown
//! - [`loyalty`] - Points accrual/redemption and the two count-threshold
//!   discount programs
//! - [`pricing`] - The fixed-order pricing pipeline
//! - [`reconcile`] - Multi-instrument payment reconciliation
//! - [`sequence`] - Receipt/invoice/credit number formats
//! - [`error`] - Domain error types
//! - [`validation`] - Request-level input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input =
//!    same output, byte-identical where serialization is involved
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are kobo (i64) to avoid float
//!    errors; percentage math rounds half up
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod loyalty;
pub mod money;
pub mod pricing;
pub mod reconcile;
pub mod sequence;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use sable_core::Money` instead of
// `use sable_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed on a single receipt.
///
/// Prevents runaway carts and keeps transaction sizes reasonable.
pub const MAX_RECEIPT_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
