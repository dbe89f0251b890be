//! # Repository Module
//!
//! Database repository implementations for Pharmacon POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Handler / saga step                                                   │
//! │       │                                                                 │
//! │       │  db.medicines().apply_delta(id, -30.0, actor)                  │
//! │       ▼                                                                 │
//! │  MedicineRepository                                                    │
//! │  ├── get_by_barcode(&self, barcode)                                    │
//! │  ├── conversions(&self, medicine_id)                                   │
//! │  └── apply_delta(&self, id, delta, actor) ← one guarded UPDATE         │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories hold a cloned pool and run one statement per call, except
//! item batches which run inside a short transaction. They never span a
//! saga: multi-step flows compose repository calls and rely on recorded
//! compensations instead.
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - Login identities
//! - [`token::TokenRepository`] - Persisted session tokens
//! - [`unit::UnitRepository`] - Units of measure
//! - [`medicine::MedicineRepository`] - Medicines, conversions, stock
//! - [`customer::CustomerRepository`], [`supplier::SupplierRepository`]
//! - [`company::CompanyProfileRepository`] - The single profile row
//! - [`production::ProductionRepository`], [`invoice::InvoiceRepository`],
//!   [`purchase::PurchaseInvoiceRepository`] - Stock documents

use chrono::NaiveDate;

pub mod company;
pub mod customer;
pub mod invoice;
pub mod medicine;
pub mod production;
pub mod purchase;
pub mod supplier;
pub mod token;
pub mod unit;
pub mod user;

/// Listing filter shared by the three document kinds.
///
/// Every field is optional; `None` means "don't filter". Dates are
/// inclusive. `party_name` matches the produced medicine for productions,
/// the customer for invoices and the supplier for purchase invoices
/// (substring, case-insensitive for ASCII).
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub number: Option<String>,
    pub user_id: Option<i64>,
    pub updated_to_stock: Option<bool>,
    pub party_name: Option<String>,
}
