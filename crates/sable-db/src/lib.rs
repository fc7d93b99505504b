//! # sable-db: Database Layer for Sable POS
//!
//! This crate provides database access for the Sable POS transaction engine.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sable POS Data Flow                              │
//! │                                                                         │
//! │  Engine use case (checkout, settlement, transfer)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     sable-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  stock, ...   │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ atomic stock  │    │ 001_init.sql │  │   │
//! │  │   │ WAL + busy    │    │ decrements,   │    │              │  │   │
//! │  │   │ timeout       │    │ sequences ... │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                      SQLite database file (WAL)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::config::ConfigRepository;
pub use repository::credit::{CreditConsumption, StoreCreditRepository};
pub use repository::loyalty::LoyaltyRepository;
pub use repository::payment::PaymentRepository;
pub use repository::receipt::ReceiptRepository;
pub use repository::stock::{StockDecrement, StockRepository};
pub use repository::transfer::TransferRepository;
