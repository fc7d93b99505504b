//! # Repository Module
//!
//! Database repository implementations for Sable POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine use case                                                        │
//! │       │                                                                 │
//! │       │  db.stock().get_by_id(id)            ← pool methods for        │
//! │       │  StockRepository::try_decrement(tx)  ← standalone reads;       │
//! │       ▼                                        associated fns taking   │
//! │  Repository                                    &mut SqliteConnection   │
//! │       │                                        for everything that     │
//! │       ▼                                        must join the checkout  │
//! │  SQLite Database                               transaction             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything that participates in the atomic checkout takes the transaction's
//! connection explicitly - there is no hidden second connection a write
//! could leak onto.
//!
//! ## Available Repositories
//!
//! - [`stock::StockRepository`] - Products and atomic stock movement
//! - [`receipt::ReceiptRepository`] - Receipts, lines, partial payments
//! - [`payment::PaymentRepository`] - Payments and instruments
//! - [`loyalty::LoyaltyRepository`] - Accounts, counters, points ledger
//! - [`credit::StoreCreditRepository`] - Store credits, FIFO consumption
//! - [`sequence`] - Counter-table number allocation
//! - [`config::ConfigRepository`] - Taxes, loyalty program, allow-list
//! - [`transfer::TransferRepository`] - Location transfer records

pub mod config;
pub mod credit;
pub mod loyalty;
pub mod payment;
pub mod receipt;
pub mod sequence;
pub mod stock;
pub mod transfer;
