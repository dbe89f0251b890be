//! # pharmacon-db: Database Layer for Pharmacon POS
//!
//! SQLite storage for the pharmacy back office, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pharmacon POS Data Flow                            │
//! │                                                                         │
//! │  HTTP handler / saga runner                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   pharmacon-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ user, token    │    │  (embedded)  │  │   │
//! │  │   │               │    │ medicine, unit │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ production     │    │ 001_initial  │  │   │
//! │  │   │ WAL, FKs on   │    │ invoice, ...   │    │ 002_stock_.. │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (or :memory: in tests)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and repository accessors
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table family
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharmacon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./pharmacon.db")).await?;
//! let medicine = db.medicines().get_by_barcode("8991002101").await?;
//! ```

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

pub use repository::company::CompanyProfileRepository;
pub use repository::customer::CustomerRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::medicine::{MedicineRepository, StockUpdate};
pub use repository::production::ProductionRepository;
pub use repository::purchase::PurchaseInvoiceRepository;
pub use repository::supplier::SupplierRepository;
pub use repository::token::TokenRepository;
pub use repository::unit::UnitRepository;
pub use repository::user::UserRepository;
pub use repository::DocumentFilter;
