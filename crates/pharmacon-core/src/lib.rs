//! # pharmacon-core: Pure Business Logic for Pharmacon POS
//!
//! Domain types and rules for the pharmacy back office, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pharmacon POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  apps/server (axum HTTP/JSON)                   │   │
//! │  │   token gate ──► handlers ──► saga runner ──► PDF renderer      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ pharmacon-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │  stock  │ │ session │ │  saga   │ │   │
//! │  │   │ records │ │  cents  │ │ factors │ │ expiry  │ │  undo   │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                pharmacon-db (Database Layer)                    │   │
//! │  │         SQLite queries, migrations, guarded stock update        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (User, Medicine, Production, Invoice, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error taxonomy (auth, stock, validation)
//! - [`validation`] - Input validation rules
//! - [`stock`] - Stock direction, unit conversion and movements
//! - [`session`] - Token claims and session expiry rules
//! - [`saga`] - Multi-step write state machine and its undo log
//!
//! ## Example Usage
//!
//! ```rust
//! use pharmacon_core::stock::{StockDirection, StockMovement};
//!
//! let movement = StockMovement::new(7, 2, 10.0, StockDirection::Increase);
//! assert_eq!(movement.base_delta(12.0), 120.0);
//! assert_eq!(movement.inverse().base_delta(12.0), -120.0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod saga;
pub mod session;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{AuthError, CoreError, CoreResult, StockError, ValidationError};
pub use money::Money;
pub use saga::{Compensation, Saga, SagaStage};
pub use session::{SessionToken, TokenClaims};
pub use stock::{StockDirection, StockMovement};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default lifetime of a session token, in seconds (24 hours).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Maximum line items accepted on a single production or invoice.
pub const MAX_DOCUMENT_ITEMS: usize = 200;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Largest price, cost, discount, tax or payment accepted, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Largest quantity accepted on a single line, in that line's unit.
pub const MAX_ITEM_QUANTITY: f64 = 1_000_000.0;
