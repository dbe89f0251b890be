//! # Business Flows
//!
//! Multi-step writes for the three stock documents. Each kind resolves
//! and validates its payload and lays out its printed copy, then hands the
//! draft to [`flow`], which runs a [`Saga`](pharmacon_core::Saga) through
//! the [`SagaRunner`](crate::saga::SagaRunner).
//!
//! ```text
//! create:  header ─► stock (if asked) ─► items ─► pdf ─► commit
//! modify:  undo old stock ─► header+items ─► new stock ─► pdf ─► commit ─► drop old pdf
//! delete:  soft delete ─► undo stock (if applied) ─► commit
//! ```

pub(crate) mod flow;
pub mod invoice;
pub mod production;
pub mod purchase;

use serde::Deserialize;

use pharmacon_core::validation::{parse_date, validate_barcode, validate_name, validate_quantity};
use pharmacon_core::{CoreError, Medicine, Money, Unit, User};
use pharmacon_db::{Database, DocumentFilter};

use crate::document::Line;
use crate::error::ApiResult;

/// Query string accepted by the list routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentQuery {
    /// Inclusive `YYYY-MM-DD`.
    pub start: Option<String>,
    /// Inclusive `YYYY-MM-DD`.
    pub end: Option<String>,
    pub number: Option<String>,
    pub user_id: Option<i64>,
    pub updated_to_stock: Option<bool>,
    /// Produced medicine, customer or supplier name, depending on the kind.
    pub party: Option<String>,
}

impl DocumentQuery {
    pub fn into_filter(self) -> ApiResult<DocumentFilter> {
        let start = self.start.as_deref().map(|d| parse_date("start", d)).transpose()?;
        let end = self.end.as_deref().map(|d| parse_date("end", d)).transpose()?;
        Ok(DocumentFilter {
            start,
            end,
            number: non_empty(self.number),
            user_id: self.user_id,
            updated_to_stock: self.updated_to_stock,
            party_name: non_empty(self.party),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// A document line after lookup: who and in what unit.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedLine {
    pub medicine: Medicine,
    pub unit: Unit,
}

/// Looks up a medicine by barcode. Medicines are never created here.
pub(crate) async fn resolve_medicine(db: &Database, barcode: &str) -> ApiResult<Medicine> {
    validate_barcode(barcode)?;
    let medicine = db
        .medicines()
        .get_by_barcode(barcode.trim())
        .await?
        .ok_or_else(|| CoreError::not_found("Medicine", format!("{} (create the medicine first)", barcode.trim())))?;
    Ok(medicine)
}

/// Looks up a unit by name, creating it on first use.
pub(crate) async fn resolve_unit(db: &Database, name: &str) -> ApiResult<Unit> {
    validate_name("unit", name)?;
    Ok(db.units().get_or_create(name).await?)
}

/// Resolves the barcode and unit of one line and checks its quantity.
pub(crate) async fn resolve_line(db: &Database, barcode: &str, unit: &str, qty: f64) -> ApiResult<ResolvedLine> {
    validate_quantity("qty", qty)?;
    let medicine = resolve_medicine(db, barcode).await?;
    let unit = resolve_unit(db, unit).await?;
    Ok(ResolvedLine { medicine, unit })
}

/// Company block printed at the top of every document.
pub(crate) async fn letterhead(db: &Database, user: &User) -> ApiResult<Vec<Line>> {
    let mut lines = Vec::new();
    if let Some(company) = db.company_profile().get().await? {
        lines.push(Line::Text(company.name));
        if !company.address.is_empty() {
            lines.push(Line::Text(company.address));
        }
        if !company.pharmacist.is_empty() {
            lines.push(Line::Text(format!(
                "Pharmacist: {} ({})",
                company.pharmacist, company.pharmacist_license_number
            )));
        }
    }
    lines.push(Line::Text(format!("Operator: {}", user.name)));
    Ok(lines)
}

/// Quantity as printed: no trailing `.0` for whole numbers.
pub(crate) fn qty_text(qty: f64) -> String {
    if qty.fract() == 0.0 {
        format!("{:.0}", qty)
    } else {
        format!("{}", qty)
    }
}

pub(crate) fn money_text(amount: Money) -> String {
    amount.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_into_filter() {
        let filter = DocumentQuery {
            start: Some("2024-01-01".to_string()),
            number: Some("  ".to_string()),
            party: Some(" Walk-in ".to_string()),
            ..DocumentQuery::default()
        }
        .into_filter()
        .unwrap();
        assert!(filter.start.is_some());
        assert!(filter.end.is_none());
        assert!(filter.number.is_none());
        assert_eq!(filter.party_name.as_deref(), Some("Walk-in"));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let query = DocumentQuery {
            end: Some("01/02/2024".to_string()),
            ..DocumentQuery::default()
        };
        assert!(query.into_filter().is_err());
    }

    #[test]
    fn test_qty_text() {
        assert_eq!(qty_text(3.0), "3");
        assert_eq!(qty_text(2.5), "2.5");
    }
}
