//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Pharmacon                              │
//! │                                                                         │
//! │  Handler / service flow                                                 │
//! │  Result<T, ApiError>                                                    │
//! │         │                                                               │
//! │         ├── AuthError ───────────────► 401 (Forbidden → 403)            │
//! │         ├── ValidationError ─────────► 400                              │
//! │         ├── NotFound (core or db) ───► 404                              │
//! │         ├── StockError ──────────────► 422                              │
//! │         ├── DbError (other) ─────────► 500, detail only in the log      │
//! │         └── compensation failed ─────► 500 "inconsistent"               │
//! │                                                                         │
//! │  Every response body: {"error": "<message>"}                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use pharmacon_core::{AuthError, CoreError, StockError, ValidationError};
use pharmacon_db::DbError;

use crate::document::RenderError;

/// API error returned from handlers.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Machine-readable error code, selects the HTTP status
    pub code: ErrorCode,

    /// Human-readable error message, sent to the client
    pub message: String,
}

/// Selects the HTTP status; never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Not authenticated (401)
    Unauthorized,

    /// Authenticated but not allowed (403)
    Forbidden,

    /// Input validation failed (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Stock adjustment refused (422)
    StockError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,

    /// A rollback left stores out of step (500)
    Inconsistent,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::StockError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::DatabaseError | ErrorCode::Internal | ErrorCode::Inconsistent => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// `404 "<resource> not found: <id>"`
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// A rollback could not undo everything. Names the failure that
    /// started the rollback.
    pub fn inconsistent(cause: &ApiError) -> Self {
        ApiError::new(
            ErrorCode::Inconsistent,
            format!(
                "inconsistent: rollback incomplete after '{}', manual reconciliation required",
                cause.message
            ),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

/// Client mistakes keep their message. Storage faults are logged with
/// their detail and answered with a generic 500.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let internal = match err {
            DbError::NotFound { entity, id } => return ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                return ApiError::validation(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!(%message, "Rejected by foreign key");
                return ApiError::validation("Record is referenced or references a missing record");
            }
            DbError::CheckViolation(message) => {
                tracing::warn!(%message, "Rejected by check constraint");
                return ApiError::validation("Value rejected by a database constraint");
            }
            other => other,
        };

        tracing::error!(error = %internal, "Storage failure");
        let message = match internal {
            DbError::PoolExhausted => "Database busy, try again",
            DbError::ConnectionFailed(_) => "Database unavailable",
            _ => "Database operation failed",
        };
        ApiError::new(ErrorCode::DatabaseError, message)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = if err.is_forbidden() {
            ErrorCode::Forbidden
        } else {
            ErrorCode::Unauthorized
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<StockError> for ApiError {
    fn from(err: StockError) -> Self {
        ApiError::new(ErrorCode::StockError, err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Auth(e) => e.into(),
            CoreError::Stock(e) => e.into(),
            CoreError::Validation(e) => e.into(),
            CoreError::NotFound { entity, key } => ApiError::not_found(&entity, &key),
            CoreError::InvalidTransition { from, to } => {
                tracing::error!(?from, ?to, "Invalid saga transition");
                ApiError::internal("Invalid document state transition")
            }
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        tracing::error!("Document rendering failed: {}", err);
        ApiError::internal(format!("error create pdf: {}", err))
    }
}

/// Serializes as `{"error": "<message>"}` with the code's status.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message }))).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(AuthError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(DbError::not_found("Invoice", 3)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DbError::duplicate("number", "INV-1")).status(),
            StatusCode::BAD_REQUEST
        );
        let stock = StockError::Insufficient {
            medicine: "PARA".to_string(),
            available: 1.0,
            requested: 2.0,
        };
        assert_eq!(ApiError::from(stock).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_db_detail_is_not_leaked() {
        let err = ApiError::from(DbError::QueryFailed("near \"SELEC\": syntax error".to_string()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_inconsistent_names_original_cause() {
        let cause = ApiError::internal("error create pdf: disk full");
        let err = ApiError::inconsistent(&cause);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("disk full"));
        assert!(err.message.starts_with("inconsistent"));
    }
}
