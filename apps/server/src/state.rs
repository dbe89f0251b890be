//! # Application State
//!
//! Shared handles injected into every handler through axum's `State`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐              │
//! │  │   Database   │  │  AuthGate    │  │ StockCoordinator │              │
//! │  │  (SQLite     │  │  + issuer    │  │  guarded deltas  │              │
//! │  │   pool)      │  │  (secret,ttl)│  │                  │              │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘              │
//! │  ┌──────────────────────┐  ┌──────────────────┐                        │
//! │  │ dyn DocumentRenderer │  │  ServerConfig    │                        │
//! │  │  (PDF files)         │  │  read-only       │                        │
//! │  └──────────────────────┘  └──────────────────┘                        │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • Database has an internal connection pool                            │
//! │  • Everything else is immutable after startup, shared through Arc     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use pharmacon_db::Database;

use crate::auth::{AuthGate, TokenIssuer};
use crate::config::ServerConfig;
use crate::document::{DocumentRenderer, PdfRenderer};
use crate::stock::StockCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub gate: Arc<AuthGate>,
    pub stock: StockCoordinator,
    pub documents: Arc<dyn DocumentRenderer>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wires the production components from configuration.
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let renderer = PdfRenderer::new(config.document_dir.clone());
        Self::with_renderer(db, config, Arc::new(renderer))
    }

    /// Same as [`AppState::new`] with a caller-supplied renderer.
    pub fn with_renderer(
        db: Database,
        config: ServerConfig,
        documents: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let issuer = TokenIssuer::new(&config.token_secret, config.token_ttl_secs);
        AppState {
            gate: Arc::new(AuthGate::new(db.clone(), issuer)),
            stock: StockCoordinator::new(db.clone()),
            db,
            documents,
            config: Arc::new(config),
        }
    }
}
