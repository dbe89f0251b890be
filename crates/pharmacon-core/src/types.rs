//! # Domain Types
//!
//! Records of the pharmacy back office.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐        │
//! │  │    User      │   │   Medicine   │   │   UnitConversion     │        │
//! │  │  name        │   │  barcode     │◄──│  medicine_id         │        │
//! │  │  admin       │   │  qty (base)  │   │  unit_id, factor     │        │
//! │  └──────────────┘   │  base_unit ──┼──►│        Unit          │        │
//! │                     └──────────────┘   └──────────────────────┘        │
//! │                                                                         │
//! │  Stock documents (header + items, soft-deleted, PDF attached):          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐        │
//! │  │  Production  │   │   Invoice    │   │   PurchaseInvoice    │        │
//! │  │  + Increase  │   │  - Decrease  │   │  + Increase          │        │
//! │  │  produced    │   │  per item    │   │  per item            │        │
//! │  └──────────────┘   └──────────────┘   └──────────────────────┘        │
//! │                                                                         │
//! │  Parties: Customer, Supplier, CompanyProfile                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Drafts vs Records
//! A `*Draft` is validated, resolved input (ids instead of barcodes and
//! unit names, amounts already computed). A record is what storage holds.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::stock::{StockDirection, StockMovement};
use crate::validation::{amount_in_range, ValidationResult};

// =============================================================================
// Document Kind
// =============================================================================

/// The three stock-affecting document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Production,
    Invoice,
    PurchaseInvoice,
}

impl DocumentKind {
    /// Stable snake_case name, also used as the PDF sub-directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Production => "production",
            DocumentKind::Invoice => "invoice",
            DocumentKind::PurchaseInvoice => "purchase_invoice",
        }
    }

    /// Heading printed on rendered documents.
    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Production => "Production",
            DocumentKind::Invoice => "Invoice",
            DocumentKind::PurchaseInvoice => "Purchase Invoice",
        }
    }

    /// Direction in which this kind of document moves stock.
    pub fn stock_direction(&self) -> StockDirection {
        match self {
            DocumentKind::Production | DocumentKind::PurchaseInvoice => StockDirection::Increase,
            DocumentKind::Invoice => StockDirection::Decrease,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// User
// =============================================================================

/// A login identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,

    /// Unique login name.
    pub name: String,

    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub admin: bool,

    pub phone_number: String,

    pub last_logged_in: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Units and Medicines
// =============================================================================

/// A unit of measure (tablet, strip, bottle, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Unit {
    pub id: i64,
    pub name: String,
}

/// A stocked medicine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Medicine {
    pub id: i64,

    /// Business identifier scanned at the counter.
    pub barcode: String,

    pub name: String,

    /// On-hand quantity in the base unit. Never negative.
    pub qty: f64,

    pub base_unit_id: i64,

    pub created_at: DateTime<Utc>,

    pub last_modified: DateTime<Utc>,

    pub last_modified_by_user_id: Option<i64>,
}

/// Base units per one `unit_id` of `medicine_id`. Strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UnitConversion {
    pub medicine_id: i64,
    pub unit_id: i64,
    pub factor: f64,
}

// =============================================================================
// Parties
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub company_phone_number: String,
    pub contact_person_name: String,
    pub contact_person_number: String,
    /// Payment terms as printed on purchase orders (e.g. "NET 30").
    pub terms: String,
    pub vendor_is_taxable: bool,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_id: i64,
}

/// Editable supplier fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierDraft {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub company_phone_number: String,
    #[serde(default)]
    pub contact_person_name: String,
    #[serde(default)]
    pub contact_person_number: String,
    #[serde(default)]
    pub terms: String,
    #[serde(default)]
    pub vendor_is_taxable: bool,
}

/// The pharmacy's own details, printed on every document. Single row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CompanyProfile {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub business_number: String,
    pub pharmacist: String,
    pub pharmacist_license_number: String,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_id: i64,
}

/// Editable company profile fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfileDraft {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub business_number: String,
    #[serde(default)]
    pub pharmacist: String,
    #[serde(default)]
    pub pharmacist_license_number: String,
}

// =============================================================================
// Production
// =============================================================================

/// A production batch header: one medicine compounded from ingredients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Production {
    pub id: i64,
    /// Unique among non-deleted productions.
    pub number: i64,
    pub produced_medicine_id: i64,
    pub produced_qty: f64,
    pub produced_unit_id: i64,
    pub production_date: NaiveDate,
    pub description: String,
    /// Whether the produced quantity was added to stock.
    pub updated_to_stock: bool,
    pub updated_to_account: bool,
    pub total_cost: Money,
    pub user_id: i64,
    pub last_modified_by_user_id: i64,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by_user_id: Option<i64>,
}

/// An ingredient line of a production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductionItem {
    pub id: i64,
    pub production_id: i64,
    pub medicine_id: i64,
    pub qty: f64,
    pub unit_id: i64,
    pub cost: Money,
}

/// Resolved production header input.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionDraft {
    pub number: i64,
    pub produced_medicine_id: i64,
    pub produced_qty: f64,
    pub produced_unit_id: i64,
    pub production_date: NaiveDate,
    pub description: String,
    pub updated_to_stock: bool,
    pub updated_to_account: bool,
    pub total_cost: Money,
    pub items: Vec<ProductionItemDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductionItemDraft {
    pub medicine_id: i64,
    pub qty: f64,
    pub unit_id: i64,
    pub cost: Money,
}

impl ProductionDraft {
    /// The produced medicine enters stock; ingredients are not consumed.
    pub fn stock_movements(&self) -> Vec<StockMovement> {
        vec![StockMovement::new(
            self.produced_medicine_id,
            self.produced_unit_id,
            self.produced_qty,
            DocumentKind::Production.stock_direction(),
        )]
    }
}

/// A production header with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    #[serde(flatten)]
    pub header: Production,
    pub items: Vec<ProductionItem>,
}

impl ProductionRecord {
    /// Movements this record applied, if it was applied to stock.
    pub fn applied_movements(&self) -> Vec<StockMovement> {
        if !self.header.updated_to_stock {
            return Vec::new();
        }
        vec![StockMovement::new(
            self.header.produced_medicine_id,
            self.header.produced_unit_id,
            self.header.produced_qty,
            DocumentKind::Production.stock_direction(),
        )]
    }
}

// =============================================================================
// Sales Invoice
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: i64,
    /// Unique among non-deleted invoices.
    pub number: String,
    pub customer_id: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    pub paid_amount: Money,
    pub change_amount: Money,
    pub payment_method: String,
    pub description: String,
    pub invoice_date: NaiveDate,
    pub updated_to_stock: bool,
    pub user_id: i64,
    pub last_modified_by_user_id: i64,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub medicine_id: i64,
    pub qty: f64,
    pub unit_id: i64,
    pub price: Money,
    pub discount: Money,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub number: String,
    pub customer_id: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    pub paid_amount: Money,
    pub change_amount: Money,
    pub payment_method: String,
    pub description: String,
    pub invoice_date: NaiveDate,
    pub updated_to_stock: bool,
    pub items: Vec<InvoiceItemDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceItemDraft {
    pub medicine_id: i64,
    pub qty: f64,
    pub unit_id: i64,
    pub price: Money,
    pub discount: Money,
    pub subtotal: Money,
}

impl InvoiceItemDraft {
    /// Builds a line, computing `price × qty − discount`.
    pub fn new(
        medicine_id: i64,
        qty: f64,
        unit_id: i64,
        price: Money,
        discount: Money,
    ) -> ValidationResult<Self> {
        let gross = amount_in_range("price", price.times_quantity(qty))?;
        Ok(InvoiceItemDraft {
            medicine_id,
            qty,
            unit_id,
            price,
            discount,
            subtotal: amount_in_range("subtotal", gross.checked_sub(discount))?,
        })
    }
}

impl InvoiceDraft {
    /// Fills in subtotal, total and change from the items.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        number: String,
        customer_id: i64,
        discount: Money,
        tax: Money,
        paid_amount: Money,
        payment_method: String,
        description: String,
        invoice_date: NaiveDate,
        updated_to_stock: bool,
        items: Vec<InvoiceItemDraft>,
    ) -> ValidationResult<Self> {
        let subtotal = amount_in_range("subtotal", Money::checked_sum(items.iter().map(|i| i.subtotal)))?;
        let total_price = amount_in_range("total_price", header_total(subtotal, discount, tax))?;
        let change_amount = amount_in_range("change_amount", paid_amount.checked_sub(total_price))?;
        Ok(InvoiceDraft {
            number,
            customer_id,
            subtotal,
            discount,
            tax,
            total_price,
            paid_amount,
            change_amount,
            payment_method,
            description,
            invoice_date,
            updated_to_stock,
            items,
        })
    }

    /// Every sold line leaves stock.
    pub fn stock_movements(&self) -> Vec<StockMovement> {
        self.items
            .iter()
            .map(|i| {
                StockMovement::new(
                    i.medicine_id,
                    i.unit_id,
                    i.qty,
                    DocumentKind::Invoice.stock_direction(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(flatten)]
    pub header: Invoice,
    pub items: Vec<InvoiceItem>,
}

impl InvoiceRecord {
    pub fn applied_movements(&self) -> Vec<StockMovement> {
        if !self.header.updated_to_stock {
            return Vec::new();
        }
        self.items
            .iter()
            .map(|i| {
                StockMovement::new(
                    i.medicine_id,
                    i.unit_id,
                    i.qty,
                    DocumentKind::Invoice.stock_direction(),
                )
            })
            .collect()
    }
}

// =============================================================================
// Purchase Invoice
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseInvoice {
    pub id: i64,
    /// Supplier's invoice number. Unique among non-deleted purchases.
    pub number: String,
    pub supplier_id: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    pub description: String,
    pub invoice_date: NaiveDate,
    pub updated_to_stock: bool,
    pub user_id: i64,
    pub last_modified_by_user_id: i64,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: i64,
    pub purchase_invoice_id: i64,
    pub medicine_id: i64,
    pub qty: f64,
    pub unit_id: i64,
    pub purchase_price: Money,
    pub discount: Money,
    pub tax: Money,
    pub subtotal: Money,
    pub batch_number: String,
    pub expired_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseInvoiceDraft {
    pub number: String,
    pub supplier_id: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    pub description: String,
    pub invoice_date: NaiveDate,
    pub updated_to_stock: bool,
    pub items: Vec<PurchaseItemDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseItemDraft {
    pub medicine_id: i64,
    pub qty: f64,
    pub unit_id: i64,
    pub purchase_price: Money,
    pub discount: Money,
    pub tax: Money,
    pub subtotal: Money,
    pub batch_number: String,
    pub expired_date: Option<NaiveDate>,
}

impl PurchaseItemDraft {
    /// Builds a line, computing `price × qty − discount + tax`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        medicine_id: i64,
        qty: f64,
        unit_id: i64,
        purchase_price: Money,
        discount: Money,
        tax: Money,
        batch_number: String,
        expired_date: Option<NaiveDate>,
    ) -> ValidationResult<Self> {
        let gross = amount_in_range("purchase_price", purchase_price.times_quantity(qty))?;
        Ok(PurchaseItemDraft {
            medicine_id,
            qty,
            unit_id,
            purchase_price,
            discount,
            tax,
            subtotal: amount_in_range("subtotal", header_total(gross, discount, tax))?,
            batch_number,
            expired_date,
        })
    }
}

impl PurchaseInvoiceDraft {
    /// Fills in subtotal and total from the items.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        number: String,
        supplier_id: i64,
        discount: Money,
        tax: Money,
        description: String,
        invoice_date: NaiveDate,
        updated_to_stock: bool,
        items: Vec<PurchaseItemDraft>,
    ) -> ValidationResult<Self> {
        let subtotal = amount_in_range("subtotal", Money::checked_sum(items.iter().map(|i| i.subtotal)))?;
        Ok(PurchaseInvoiceDraft {
            number,
            supplier_id,
            subtotal,
            discount,
            tax,
            total_price: amount_in_range("total_price", header_total(subtotal, discount, tax))?,
            description,
            invoice_date,
            updated_to_stock,
            items,
        })
    }

    /// Every purchased line enters stock.
    pub fn stock_movements(&self) -> Vec<StockMovement> {
        self.items
            .iter()
            .map(|i| {
                StockMovement::new(
                    i.medicine_id,
                    i.unit_id,
                    i.qty,
                    DocumentKind::PurchaseInvoice.stock_direction(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseInvoiceRecord {
    #[serde(flatten)]
    pub header: PurchaseInvoice,
    pub items: Vec<PurchaseItem>,
}

impl PurchaseInvoiceRecord {
    pub fn applied_movements(&self) -> Vec<StockMovement> {
        if !self.header.updated_to_stock {
            return Vec::new();
        }
        self.items
            .iter()
            .map(|i| {
                StockMovement::new(
                    i.medicine_id,
                    i.unit_id,
                    i.qty,
                    DocumentKind::PurchaseInvoice.stock_direction(),
                )
            })
            .collect()
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// A full copy of a document taken before it is modified, so a failed
/// modification can put it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentSnapshot {
    Production(ProductionRecord),
    Invoice(InvoiceRecord),
    PurchaseInvoice(PurchaseInvoiceRecord),
}

impl DocumentSnapshot {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentSnapshot::Production(_) => DocumentKind::Production,
            DocumentSnapshot::Invoice(_) => DocumentKind::Invoice,
            DocumentSnapshot::PurchaseInvoice(_) => DocumentKind::PurchaseInvoice,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            DocumentSnapshot::Production(r) => r.header.id,
            DocumentSnapshot::Invoice(r) => r.header.id,
            DocumentSnapshot::PurchaseInvoice(r) => r.header.id,
        }
    }
}

/// `subtotal − discount + tax`, `None` on overflow.
fn header_total(subtotal: Money, discount: Money, tax: Money) -> Option<Money> {
    subtotal.checked_sub(discount)?.checked_add(tax)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_user_never_serializes_password_hash() {
        let user = User {
            id: 1,
            name: "admin".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            admin: true,
            phone_number: "0812".to_string(),
            last_logged_in: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["name"], "admin");
    }

    #[test]
    fn test_invoice_totals() {
        let items = vec![
            InvoiceItemDraft::new(1, 2.0, 1, Money::from_cents(1000), Money::from_cents(100)).unwrap(),
            InvoiceItemDraft::new(2, 1.0, 1, Money::from_cents(500), Money::zero()).unwrap(),
        ];
        let draft = InvoiceDraft::new(
            "INV-1".to_string(),
            3,
            Money::from_cents(400),
            Money::from_cents(150),
            Money::from_cents(2000),
            "cash".to_string(),
            String::new(),
            date(),
            true,
            items,
        )
        .unwrap();
        assert_eq!(draft.subtotal.cents(), 2400);
        assert_eq!(draft.total_price.cents(), 2150);
        assert_eq!(draft.change_amount.cents(), -150);
        assert!(draft
            .stock_movements()
            .iter()
            .all(|m| m.direction == StockDirection::Decrease));
    }

    #[test]
    fn test_purchase_line_includes_tax() {
        let line = PurchaseItemDraft::new(
            1,
            10.0,
            1,
            Money::from_cents(200),
            Money::from_cents(100),
            Money::from_cents(50),
            "B-01".to_string(),
            None,
        )
        .unwrap();
        assert_eq!(line.subtotal.cents(), 1950);
    }

    #[test]
    fn test_invoice_total_overflow_is_a_validation_error() {
        let price = Money::from_cents(i64::MAX / 2 + 1);
        let items = vec![
            InvoiceItemDraft::new(1, 1.0, 1, price, Money::zero()).unwrap(),
            InvoiceItemDraft::new(2, 1.0, 1, price, Money::zero()).unwrap(),
        ];
        let err = InvoiceDraft::new(
            "INV-9".to_string(),
            3,
            Money::zero(),
            Money::zero(),
            Money::zero(),
            "cash".to_string(),
            String::new(),
            date(),
            true,
            items,
        )
        .unwrap_err();
        assert!(matches!(err, crate::ValidationError::NotAllowed { ref field, .. } if field == "subtotal"));

        assert!(InvoiceItemDraft::new(1, 3.0, 1, Money::from_cents(i64::MAX / 2), Money::zero()).is_err());
    }

    #[test]
    fn test_production_moves_produced_medicine_up() {
        let draft = ProductionDraft {
            number: 1,
            produced_medicine_id: 9,
            produced_qty: 10.0,
            produced_unit_id: 1,
            production_date: date(),
            description: String::new(),
            updated_to_stock: true,
            updated_to_account: false,
            total_cost: Money::zero(),
            items: vec![],
        };
        let movements = draft.stock_movements();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].medicine_id, 9);
        assert_eq!(movements[0].direction, StockDirection::Increase);
    }

    #[test]
    fn test_document_kind_names() {
        assert_eq!(DocumentKind::PurchaseInvoice.as_str(), "purchase_invoice");
        assert_eq!(DocumentKind::Invoice.to_string(), "invoice");
        assert_eq!(DocumentKind::Production.title(), "Production");
    }
}
