//! # HTTP Routes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /health                      public                                    │
//! │  /user/login, /user/init-admin public                                   │
//! │  /user/...                     CurrentUser / AdminUser                  │
//! │  /medicine, /unit              CurrentUser                              │
//! │  /customer, /supplier          CurrentUser (delete: AdminUser)          │
//! │  /company-profile              GET CurrentUser, PUT AdminUser           │
//! │  /production, /invoice,                                                 │
//! │  /purchase-invoice             CurrentUser (delete: AdminUser)          │
//! │  /prescription/print           CurrentUser                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod documents;
pub mod medicine;
pub mod party;
pub mod user;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(user::routes())
        .merge(medicine::routes())
        .merge(party::routes())
        .merge(documents::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.db.health_check().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}
