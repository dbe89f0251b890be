//! Purchase invoices from suppliers. Every line enters stock when
//! `updated_to_stock` is set.

use async_trait::async_trait;
use serde::Deserialize;

use pharmacon_core::validation::{
    parse_date, validate_amount, validate_document_number, validate_item_count, validate_name,
};
use pharmacon_core::{
    CoreError, DocumentKind, DocumentSnapshot, Money, PurchaseInvoiceDraft, PurchaseInvoiceRecord,
    PurchaseItemDraft, StockMovement, Supplier, User,
};
use pharmacon_db::{Database, DbResult};

use crate::document::{Line, PrintableDocument};
use crate::error::ApiResult;
use crate::services::flow::{self, StockDocument};
use crate::services::{letterhead, money_text, qty_text, resolve_line, ResolvedLine};
use crate::state::AppState;

const KIND: DocumentKind = DocumentKind::PurchaseInvoice;

// =============================================================================
// Payload
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PurchasePayload {
    /// The supplier's invoice number.
    pub number: String,
    pub supplier_name: String,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`
    pub invoice_date: String,
    /// Must be sent explicitly.
    pub updated_to_stock: bool,
    pub items: Vec<PurchaseLinePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseLinePayload {
    pub barcode: String,
    pub qty: f64,
    pub unit: String,
    pub purchase_price: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub batch_number: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub expired_date: Option<String>,
}

struct Resolved {
    draft: PurchaseInvoiceDraft,
    supplier: Supplier,
    lines: Vec<ResolvedLine>,
}

async fn resolve(state: &AppState, payload: &PurchasePayload) -> ApiResult<Resolved> {
    validate_document_number(&payload.number)?;
    validate_name("supplier_name", &payload.supplier_name)?;
    validate_amount("discount", payload.discount)?;
    validate_amount("tax", payload.tax)?;
    validate_item_count(payload.items.len(), false)?;
    let invoice_date = parse_date("invoice_date", &payload.invoice_date)?;

    let supplier = state
        .db
        .suppliers()
        .get_by_name(&payload.supplier_name)
        .await?
        .ok_or_else(|| CoreError::not_found("Supplier", payload.supplier_name.trim()))?;

    let mut lines = Vec::with_capacity(payload.items.len());
    let mut items = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        validate_amount("purchase_price", item.purchase_price)?;
        validate_amount("discount", item.discount)?;
        validate_amount("tax", item.tax)?;
        let expired_date = item
            .expired_date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| parse_date("expired_date", d))
            .transpose()?;
        let line = resolve_line(&state.db, &item.barcode, &item.unit, item.qty).await?;
        items.push(PurchaseItemDraft::new(
            line.medicine.id,
            item.qty,
            line.unit.id,
            item.purchase_price,
            item.discount,
            item.tax,
            item.batch_number.trim().to_string(),
            expired_date,
        )?);
        lines.push(line);
    }

    let draft = PurchaseInvoiceDraft::new(
        payload.number.trim().to_string(),
        supplier.id,
        payload.discount,
        payload.tax,
        payload.description.trim().to_string(),
        invoice_date,
        payload.updated_to_stock,
        items,
    )?;

    Ok(Resolved {
        draft,
        supplier,
        lines,
    })
}

async fn printable(state: &AppState, resolved: &Resolved, user: &User) -> ApiResult<PrintableDocument> {
    let draft = &resolved.draft;
    let mut doc = PrintableDocument::new(KIND.as_str(), KIND.title(), draft.number.clone(), draft.invoice_date);
    doc.header = letterhead(&state.db, user).await?;
    doc.header.push(Line::Text(format!("Supplier: {}", resolved.supplier.name)));
    if !resolved.supplier.terms.is_empty() {
        doc.header.push(Line::Text(format!("Terms: {}", resolved.supplier.terms)));
    }
    if !draft.description.is_empty() {
        doc.header.push(Line::Text(draft.description.clone()));
    }
    doc.columns = vec![
        "Medicine".into(),
        "Qty".into(),
        "Unit".into(),
        "Price".into(),
        "Batch".into(),
        "Expires".into(),
        "Subtotal".into(),
    ];
    doc.rows = resolved
        .lines
        .iter()
        .zip(&draft.items)
        .map(|(line, item)| {
            vec![
                line.medicine.name.clone(),
                qty_text(item.qty),
                line.unit.name.clone(),
                money_text(item.purchase_price),
                item.batch_number.clone(),
                item.expired_date.map(|d| d.to_string()).unwrap_or_default(),
                money_text(item.subtotal),
            ]
        })
        .collect();
    doc.footer = vec![
        Line::Text(format!("Subtotal: {}", money_text(draft.subtotal))),
        Line::Text(format!("Discount: {}", money_text(draft.discount))),
        Line::Text(format!("Tax: {}", money_text(draft.tax))),
        Line::Heading(format!("Total: {}", money_text(draft.total_price))),
    ];
    Ok(doc)
}

// =============================================================================
// Storage
// =============================================================================

pub(crate) struct PurchaseInvoices;

#[async_trait]
impl StockDocument for PurchaseInvoices {
    const KIND: DocumentKind = KIND;
    const NUMBER_FIELD: &'static str = "purchase invoice number";

    type Draft = PurchaseInvoiceDraft;
    type Record = PurchaseInvoiceRecord;

    fn draft_number(draft: &PurchaseInvoiceDraft) -> String {
        draft.number.clone()
    }

    fn draft_updates_stock(draft: &PurchaseInvoiceDraft) -> bool {
        draft.updated_to_stock
    }

    fn draft_movements(draft: &PurchaseInvoiceDraft) -> Vec<StockMovement> {
        draft.stock_movements()
    }

    fn record_id(record: &PurchaseInvoiceRecord) -> i64 {
        record.header.id
    }

    fn record_number(record: &PurchaseInvoiceRecord) -> String {
        record.header.number.clone()
    }

    fn record_pdf(record: &PurchaseInvoiceRecord) -> Option<&str> {
        record.header.pdf_url.as_deref()
    }

    fn record_movements(record: &PurchaseInvoiceRecord) -> Vec<StockMovement> {
        record.applied_movements()
    }

    fn snapshot(record: &PurchaseInvoiceRecord) -> DocumentSnapshot {
        DocumentSnapshot::PurchaseInvoice(record.clone())
    }

    async fn number_in_use(db: &Database, draft: &PurchaseInvoiceDraft, excluding: Option<i64>) -> DbResult<bool> {
        db.purchase_invoices().number_in_use(&draft.number, excluding).await
    }

    async fn insert(db: &Database, draft: &PurchaseInvoiceDraft, actor: i64) -> DbResult<i64> {
        Ok(db.purchase_invoices().insert(draft, actor).await?.id)
    }

    async fn update_header(db: &Database, id: i64, draft: &PurchaseInvoiceDraft, actor: i64) -> DbResult<()> {
        db.purchase_invoices().update_header(id, draft, actor).await.map(drop)
    }

    async fn insert_items(db: &Database, id: i64, draft: &PurchaseInvoiceDraft) -> DbResult<()> {
        db.purchase_invoices().insert_items(id, &draft.items).await.map(drop)
    }

    async fn replace_items(db: &Database, id: i64, draft: &PurchaseInvoiceDraft) -> DbResult<()> {
        db.purchase_invoices().replace_items(id, &draft.items).await.map(drop)
    }

    async fn set_pdf_url(db: &Database, id: i64, path: &str) -> DbResult<()> {
        db.purchase_invoices().set_pdf_url(id, Some(path)).await
    }

    async fn soft_delete(db: &Database, id: i64, actor: i64) -> DbResult<()> {
        db.purchase_invoices().soft_delete(id, actor).await
    }

    async fn get_record(db: &Database, id: i64) -> DbResult<Option<PurchaseInvoiceRecord>> {
        db.purchase_invoices().get_record(id).await
    }
}

// =============================================================================
// Flows
// =============================================================================

pub async fn create(state: &AppState, payload: PurchasePayload, user: &User) -> ApiResult<PurchaseInvoiceRecord> {
    let resolved = resolve(state, &payload).await?;
    let document = printable(state, &resolved, user).await?;
    flow::create::<PurchaseInvoices>(state, &resolved.draft, &document, user).await
}

pub async fn modify(state: &AppState, id: i64, payload: PurchasePayload, user: &User) -> ApiResult<PurchaseInvoiceRecord> {
    let old = flow::load::<PurchaseInvoices>(state, id).await?;
    let resolved = resolve(state, &payload).await?;
    let document = printable(state, &resolved, user).await?;
    flow::modify::<PurchaseInvoices>(state, &old, &resolved.draft, &document, user).await
}

pub async fn delete(state: &AppState, id: i64, user: &User) -> ApiResult<()> {
    flow::delete::<PurchaseInvoices>(state, id, user).await
}

pub async fn detail(state: &AppState, id: i64) -> ApiResult<PurchaseInvoiceRecord> {
    flow::load::<PurchaseInvoices>(state, id).await
}
