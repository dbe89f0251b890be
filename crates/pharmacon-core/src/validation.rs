//! # Validation Module
//!
//! Input validation for request payloads.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum Json extractor                                          │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Handler (Rust)                                               │
//! │  └── THIS MODULE: field rules, checked BEFORE any saga starts          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE constraints (names, live document numbers)                 │
//! │  ├── CHECK (qty >= 0, factor > 0)                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharmacon_core::validation::{validate_name, validate_quantity};
//!
//! validate_name("name", "Paracetamol 500mg").unwrap();
//! assert!(validate_quantity("qty", -1.0).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT_CENTS, MAX_DOCUMENT_ITEMS, MAX_ITEM_QUANTITY, MIN_PASSWORD_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_NUMBER_LEN: usize = 64;
const MAX_BARCODE_LEN: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (user, medicine, unit, party).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a password at registration or modification.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }

    Ok(())
}

/// Validates a medicine barcode.
///
/// ## Rules
/// - Not empty, at most 64 characters
/// - No whitespace inside (scanners never emit it)
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if barcode.len() > MAX_BARCODE_LEN {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: MAX_BARCODE_LEN,
        });
    }

    if barcode.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates an invoice / purchase invoice number.
pub fn validate_document_number(number: &str) -> ValidationResult<()> {
    let number = number.trim();

    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "number".to_string(),
        });
    }

    if number.len() > MAX_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: "number".to_string(),
            max: MAX_NUMBER_LEN,
        });
    }

    Ok(())
}

/// Parses a `YYYY-MM-DD` business date.
pub fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("expected YYYY-MM-DD ({})", e),
        }
    })
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a transaction quantity: finite, strictly positive and at most
/// [`MAX_ITEM_QUANTITY`].
pub fn validate_quantity(field: &str, qty: f64) -> ValidationResult<()> {
    if !qty.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }

    if qty <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::NotAllowed {
            field: field.to_string(),
            reason: format!("must be at most {}", MAX_ITEM_QUANTITY),
        });
    }

    Ok(())
}

/// Validates an opening stock quantity: finite and not negative.
pub fn validate_opening_stock(qty: f64) -> ValidationResult<()> {
    if !qty.is_finite() || qty < 0.0 {
        return Err(ValidationError::InvalidFormat {
            field: "qty".to_string(),
            reason: "must be a finite number of at least 0".to_string(),
        });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::NotAllowed {
            field: "qty".to_string(),
            reason: format!("must be at most {}", MAX_ITEM_QUANTITY),
        });
    }
    Ok(())
}

/// Validates a unit conversion factor.
pub fn validate_factor(factor: f64) -> ValidationResult<()> {
    validate_quantity("factor", factor)
}

/// Validates a price, cost, discount or tax amount.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    if amount.cents() > MAX_AMOUNT_CENTS {
        return Err(ValidationError::NotAllowed {
            field: field.to_string(),
            reason: format!("must be at most {}", Money::from_cents(MAX_AMOUNT_CENTS)),
        });
    }
    Ok(())
}

/// Unwraps a checked money computation, naming the field that overflowed.
pub fn amount_in_range(field: &str, amount: Option<Money>) -> ValidationResult<Money> {
    amount.ok_or_else(|| ValidationError::NotAllowed {
        field: field.to_string(),
        reason: "amount out of range".to_string(),
    })
}

/// Validates the line item count of a document.
pub fn validate_item_count(count: usize, allow_empty: bool) -> ValidationResult<()> {
    if count == 0 && !allow_empty {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if count > MAX_DOCUMENT_ITEMS {
        return Err(ValidationError::NotAllowed {
            field: "items".to_string(),
            reason: format!("at most {} lines per document", MAX_DOCUMENT_ITEMS),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
