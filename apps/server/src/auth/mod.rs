//! # Authentication
//!
//! Credential hashing, token signing and the request gate.
//!
//! ## Extractors
//! ```text
//! async fn handler(CurrentUser(user): CurrentUser, ...)   // any logged-in user
//! async fn handler(AdminUser(user): AdminUser, ...)       // admin only (403 otherwise)
//! ```
//!
//! Both run [`AuthGate::validate`] before the handler body; a rejection
//! short-circuits with `{"error": "..."}`.

pub mod gate;
pub mod password;
pub mod tokens;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use pharmacon_core::User;

use crate::error::ApiError;
use crate::state::AppState;

pub use gate::AuthGate;
pub use tokens::{TokenDetails, TokenIssuer};

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = state.gate.validate(&parts.headers, false).await?;
        Ok(CurrentUser(user))
    }
}

/// The authenticated caller, who must be an admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = state.gate.validate(&parts.headers, true).await?;
        Ok(AdminUser(user))
    }
}
