//! # Error Types
//!
//! Domain error taxonomy for pharmacon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pharmacon-core errors (this file)                                     │
//! │  ├── CoreError        - Umbrella for domain failures                   │
//! │  ├── AuthError        - Token gate and login failures                  │
//! │  ├── StockError       - Stock adjustment refusals                      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  pharmacon-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Server errors (apps/server)                                           │
//! │  └── ApiError         - What HTTP clients see ({"error": "..."})       │
//! │                                                                         │
//! │  Flow: ValidationError/AuthError/StockError → CoreError → ApiError     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::saga::SagaStage;

// =============================================================================
// Core Error
// =============================================================================

/// Domain errors raised by business rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Authentication or authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Stock adjustment refused.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced entity is absent.
    ///
    /// ## When This Occurs
    /// - Medicine barcode has no record yet ("create the medicine first")
    /// - Customer or supplier name is unknown
    /// - Production / invoice id is missing or soft-deleted
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// A saga was driven backwards or past a terminal stage.
    #[error("Invalid saga transition from {from:?} to {to:?}")]
    InvalidTransition { from: SagaStage, to: SagaStage },
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and lookup key.
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }
}

// =============================================================================
// Auth Error
// =============================================================================

/// Token gate failures.
///
/// ## Token Lifecycle
/// ```text
/// Authorization header
///      │
///      ├── missing / not "Bearer ..." ──► Malformed ─┐
///      ├── bad signature ───────────────► InvalidSignature ─┤
///      │                                               ▼
///      │                                   (gate reports NoToken)
///      ▼
/// stored (uuid, user_id) row?
///      ├── absent or expired ──► row deleted, Expired
///      ▼
/// user row?
///      ├── absent ──► UserNotFound
///      ▼
/// admin required but not admin ──► Forbidden
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable bearer token on the request.
    #[error("no valid token provided")]
    NoToken,

    /// Authorization header missing or unparseable.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Token signature does not verify against the server secret.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Session row absent or past its expiry. The client must log in again.
    #[error("token expired, log in again")]
    Expired,

    /// The token's user was deleted after the token was issued.
    #[error("user {0} not found")]
    UserNotFound(i64),

    /// Authenticated, but the route requires an admin.
    #[error("admin access required")]
    Forbidden,

    /// Login name or password did not match.
    #[error("invalid name or password")]
    InvalidCredentials,
}

impl AuthError {
    /// Whether this failure means "authenticated but not allowed" rather
    /// than "not authenticated".
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::Forbidden)
    }
}

// =============================================================================
// Stock Error
// =============================================================================

/// Stock adjustment refusals. Fatal to the enclosing operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StockError {
    /// A decrease would drive the stored quantity below zero.
    #[error("Insufficient stock for {medicine}: available {available}, requested {requested}")]
    Insufficient {
        medicine: String,
        available: f64,
        requested: f64,
    },

    /// The transaction unit has no conversion to the medicine's base unit.
    #[error("Unit '{unit}' cannot be converted for {medicine}")]
    UnitUnresolvable { medicine: String, unit: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write so that a rejected payload never starts a saga.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid date, non-finite number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not permitted in the current state.
    #[error("{field}: {reason}")]
    NotAllowed { field: String, reason: String },

    /// Duplicate value (e.g., production number already used).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_error_message() {
        let err = StockError::Insufficient {
            medicine: "PARA-500".to_string(),
            available: 3.0,
            requested: 5.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for PARA-500: available 3, requested 5"
        );
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(AuthError::Expired.to_string(), "token expired, log in again");
        assert_eq!(AuthError::UserNotFound(4).to_string(), "user 4 not found");
        assert!(AuthError::Forbidden.is_forbidden());
        assert!(!AuthError::NoToken.is_forbidden());
    }

    #[test]
    fn test_errors_convert_to_core_error() {
        let core: CoreError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(core, CoreError::Validation(_)));

        let core: CoreError = AuthError::Forbidden.into();
        assert_eq!(core.to_string(), "admin access required");

        let core = CoreError::not_found("Medicine", "899100");
        assert_eq!(core.to_string(), "Medicine not found: 899100");
    }
}
