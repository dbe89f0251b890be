//! Sales invoices. Every line leaves stock when `updated_to_stock` is set.

use async_trait::async_trait;
use serde::Deserialize;

use pharmacon_core::validation::{
    parse_date, validate_amount, validate_document_number, validate_item_count, validate_name,
};
use pharmacon_core::{
    CoreError, Customer, DocumentKind, DocumentSnapshot, InvoiceDraft, InvoiceItemDraft, InvoiceRecord,
    Money, StockMovement, User,
};
use pharmacon_db::{Database, DbResult};

use crate::document::{Line, PrintableDocument};
use crate::error::ApiResult;
use crate::services::flow::{self, StockDocument};
use crate::services::{letterhead, money_text, qty_text, resolve_line, ResolvedLine};
use crate::state::AppState;

const KIND: DocumentKind = DocumentKind::Invoice;

// =============================================================================
// Payload
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePayload {
    pub number: String,
    pub customer_name: String,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub paid_amount: Money,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`
    pub invoice_date: String,
    /// Must be sent explicitly.
    pub updated_to_stock: bool,
    pub items: Vec<InvoiceLinePayload>,
}

fn default_payment_method() -> String {
    "cash".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLinePayload {
    pub barcode: String,
    pub qty: f64,
    pub unit: String,
    pub price: Money,
    #[serde(default)]
    pub discount: Money,
}

struct Resolved {
    draft: InvoiceDraft,
    customer: Customer,
    lines: Vec<ResolvedLine>,
}

async fn resolve(state: &AppState, payload: &InvoicePayload) -> ApiResult<Resolved> {
    validate_document_number(&payload.number)?;
    validate_name("customer_name", &payload.customer_name)?;
    validate_amount("discount", payload.discount)?;
    validate_amount("tax", payload.tax)?;
    validate_amount("paid_amount", payload.paid_amount)?;
    validate_item_count(payload.items.len(), false)?;
    let invoice_date = parse_date("invoice_date", &payload.invoice_date)?;

    let customer = state
        .db
        .customers()
        .get_by_name(&payload.customer_name)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", payload.customer_name.trim()))?;

    let mut lines = Vec::with_capacity(payload.items.len());
    let mut items = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        validate_amount("price", item.price)?;
        validate_amount("discount", item.discount)?;
        let line = resolve_line(&state.db, &item.barcode, &item.unit, item.qty).await?;
        items.push(InvoiceItemDraft::new(
            line.medicine.id,
            item.qty,
            line.unit.id,
            item.price,
            item.discount,
        )?);
        lines.push(line);
    }

    let draft = InvoiceDraft::new(
        payload.number.trim().to_string(),
        customer.id,
        payload.discount,
        payload.tax,
        payload.paid_amount,
        payload.payment_method.trim().to_string(),
        payload.description.trim().to_string(),
        invoice_date,
        payload.updated_to_stock,
        items,
    )?;

    Ok(Resolved {
        draft,
        customer,
        lines,
    })
}

async fn printable(state: &AppState, resolved: &Resolved, user: &User) -> ApiResult<PrintableDocument> {
    let draft = &resolved.draft;
    let mut doc = PrintableDocument::new(KIND.as_str(), KIND.title(), draft.number.clone(), draft.invoice_date);
    doc.header = letterhead(&state.db, user).await?;
    doc.header.push(Line::Text(format!("Customer: {}", resolved.customer.name)));
    if !draft.description.is_empty() {
        doc.header.push(Line::Text(draft.description.clone()));
    }
    doc.columns = vec![
        "Medicine".into(),
        "Qty".into(),
        "Unit".into(),
        "Price".into(),
        "Discount".into(),
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
                money_text(item.price),
                money_text(item.discount),
                money_text(item.subtotal),
            ]
        })
        .collect();
    doc.footer = vec![
        Line::Text(format!("Subtotal: {}", money_text(draft.subtotal))),
        Line::Text(format!("Discount: {}", money_text(draft.discount))),
        Line::Text(format!("Tax: {}", money_text(draft.tax))),
        Line::Heading(format!("Total: {}", money_text(draft.total_price))),
        Line::Text(format!(
            "Paid ({}): {}   Change: {}",
            draft.payment_method,
            money_text(draft.paid_amount),
            money_text(draft.change_amount)
        )),
    ];
    Ok(doc)
}

// =============================================================================
// Storage
// =============================================================================

pub(crate) struct Invoices;

#[async_trait]
impl StockDocument for Invoices {
    const KIND: DocumentKind = KIND;
    const NUMBER_FIELD: &'static str = "invoice number";

    type Draft = InvoiceDraft;
    type Record = InvoiceRecord;

    fn draft_number(draft: &InvoiceDraft) -> String {
        draft.number.clone()
    }

    fn draft_updates_stock(draft: &InvoiceDraft) -> bool {
        draft.updated_to_stock
    }

    fn draft_movements(draft: &InvoiceDraft) -> Vec<StockMovement> {
        draft.stock_movements()
    }

    fn record_id(record: &InvoiceRecord) -> i64 {
        record.header.id
    }

    fn record_number(record: &InvoiceRecord) -> String {
        record.header.number.clone()
    }

    fn record_pdf(record: &InvoiceRecord) -> Option<&str> {
        record.header.pdf_url.as_deref()
    }

    fn record_movements(record: &InvoiceRecord) -> Vec<StockMovement> {
        record.applied_movements()
    }

    fn snapshot(record: &InvoiceRecord) -> DocumentSnapshot {
        DocumentSnapshot::Invoice(record.clone())
    }

    async fn number_in_use(db: &Database, draft: &InvoiceDraft, excluding: Option<i64>) -> DbResult<bool> {
        db.invoices().number_in_use(&draft.number, excluding).await
    }

    async fn insert(db: &Database, draft: &InvoiceDraft, actor: i64) -> DbResult<i64> {
        Ok(db.invoices().insert(draft, actor).await?.id)
    }

    async fn update_header(db: &Database, id: i64, draft: &InvoiceDraft, actor: i64) -> DbResult<()> {
        db.invoices().update_header(id, draft, actor).await.map(drop)
    }

    async fn insert_items(db: &Database, id: i64, draft: &InvoiceDraft) -> DbResult<()> {
        db.invoices().insert_items(id, &draft.items).await.map(drop)
    }

    async fn replace_items(db: &Database, id: i64, draft: &InvoiceDraft) -> DbResult<()> {
        db.invoices().replace_items(id, &draft.items).await.map(drop)
    }

    async fn set_pdf_url(db: &Database, id: i64, path: &str) -> DbResult<()> {
        db.invoices().set_pdf_url(id, Some(path)).await
    }

    async fn soft_delete(db: &Database, id: i64, actor: i64) -> DbResult<()> {
        db.invoices().soft_delete(id, actor).await
    }

    async fn get_record(db: &Database, id: i64) -> DbResult<Option<InvoiceRecord>> {
        db.invoices().get_record(id).await
    }
}

// =============================================================================
// Flows
// =============================================================================

pub async fn create(state: &AppState, payload: InvoicePayload, user: &User) -> ApiResult<InvoiceRecord> {
    let resolved = resolve(state, &payload).await?;
    let document = printable(state, &resolved, user).await?;
    flow::create::<Invoices>(state, &resolved.draft, &document, user).await
}

pub async fn modify(state: &AppState, id: i64, payload: InvoicePayload, user: &User) -> ApiResult<InvoiceRecord> {
    let old = flow::load::<Invoices>(state, id).await?;
    let resolved = resolve(state, &payload).await?;
    let document = printable(state, &resolved, user).await?;
    flow::modify::<Invoices>(state, &old, &resolved.draft, &document, user).await
}

pub async fn delete(state: &AppState, id: i64, user: &User) -> ApiResult<()> {
    flow::delete::<Invoices>(state, id, user).await
}

pub async fn detail(state: &AppState, id: i64) -> ApiResult<InvoiceRecord> {
    flow::load::<Invoices>(state, id).await
}
