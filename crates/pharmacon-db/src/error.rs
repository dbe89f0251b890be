//! # Storage Errors
//!
//! Every repository call returns [`DbResult`]. SQLite failures are sorted
//! into the few cases the HTTP layer answers differently:
//!
//! ```text
//!   sqlx::Error ──► DbError ──► ApiError
//!
//!   no row ............ NotFound ........... 404
//!   UNIQUE ............ UniqueViolation .... 400 "<field> '<value>' already exists"
//!   FOREIGN KEY ....... ForeignKeyViolation  400
//!   CHECK ............. CheckViolation ..... 400
//!   anything else ..... 500, details only in the log
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Lookup, update or delete matched no live row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A name, barcode or live document number is already taken.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A row still references this one, or points at a missing one.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Rejected by a CHECK, e.g. negative stock or a zero unit factor.
    #[error("Constraint violation: {0}")]
    CheckViolation(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Replaces SQLite's `table.column` with a readable field and the
    /// submitted value. Any other error is returned untouched.
    pub fn on_duplicate(self, field: &str, value: impl ToString) -> Self {
        if let DbError::UniqueViolation { .. } = self {
            DbError::duplicate(field, value.to_string())
        } else {
            self
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match err {
            sqlx::Error::Database(db_err) => db_err,
            sqlx::Error::RowNotFound => return DbError::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => return DbError::PoolExhausted,
            sqlx::Error::PoolClosed => return DbError::ConnectionFailed("pool closed".to_string()),
            other => return DbError::Internal(other.to_string()),
        };

        let message = db_err.message().to_string();
        match db_err.kind() {
            // SQLite: "UNIQUE constraint failed: medicines.barcode"
            ErrorKind::UniqueViolation => {
                let column = message.rsplit(": ").next().unwrap_or("unknown");
                DbError::duplicate(column, "unknown")
            }
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
            ErrorKind::CheckViolation => DbError::CheckViolation(message),
            _ => DbError::QueryFailed(message),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_row() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_messages() {
        assert_eq!(DbError::not_found("Medicine", 7).to_string(), "Medicine not found: 7");
        assert_eq!(
            DbError::duplicate("name", "admin").to_string(),
            "Duplicate name: 'admin' already exists"
        );
    }

    #[test]
    fn test_on_duplicate_only_touches_unique_violations() {
        let err = DbError::duplicate("invoices.number", "unknown").on_duplicate("invoice number", "INV-1");
        assert_eq!(err.to_string(), "Duplicate invoice number: 'INV-1' already exists");

        let err = DbError::PoolExhausted.on_duplicate("invoice number", "INV-1");
        assert!(matches!(err, DbError::PoolExhausted));
    }
}
