//! # Pharmacon Server
//!
//! HTTP/JSON back office for a pharmacy: users, medicines and stock,
//! parties, and the three stock documents (production, sales invoice,
//! purchase invoice) with their printable PDFs.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Request Path                                   │
//! │                                                                         │
//! │  axum Router + TraceLayer                                               │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  CurrentUser / AdminUser ──► AuthGate ──► tokens table                  │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  routes::* ──► services::{production, invoice, purchase}                │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │               SagaRunner ──┬──► StockCoordinator ──► guarded UPDATE     │
//! │                            └──► DocumentRenderer ──► <document_dir>/    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! `pharmacon.toml` (optional) and `PHARMACON_*` environment variables,
//! see [`config::ServerConfig`].

pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod routes;
pub mod saga;
pub mod services;
pub mod state;
pub mod stock;

// Re-exports
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::router;
pub use state::AppState;
