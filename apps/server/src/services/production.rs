//! Production batches: one medicine compounded from ingredients.
//!
//! Only the produced medicine moves stock (an increase). Ingredient lines
//! are recorded with their cost but are not consumed from stock.

use async_trait::async_trait;
use serde::Deserialize;

use pharmacon_core::validation::{parse_date, validate_amount, validate_item_count, validate_quantity};
use pharmacon_core::{
    DocumentKind, DocumentSnapshot, Money, ProductionDraft, ProductionItemDraft, ProductionRecord,
    StockMovement, User, ValidationError,
};
use pharmacon_db::{Database, DbResult};

use crate::document::{Line, PrintableDocument};
use crate::error::ApiResult;
use crate::services::flow::{self, StockDocument};
use crate::services::{letterhead, money_text, qty_text, resolve_line, ResolvedLine};
use crate::state::AppState;

const KIND: DocumentKind = DocumentKind::Production;

// =============================================================================
// Payload
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProductionPayload {
    pub number: i64,
    pub produced_medicine_barcode: String,
    pub produced_qty: f64,
    pub produced_unit: String,
    /// `YYYY-MM-DD`
    pub production_date: String,
    #[serde(default)]
    pub description: String,
    /// Must be sent explicitly.
    pub updated_to_stock: bool,
    #[serde(default)]
    pub updated_to_account: bool,
    #[serde(default)]
    pub total_cost: Money,
    #[serde(default)]
    pub items: Vec<ProductionLinePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductionLinePayload {
    pub barcode: String,
    pub qty: f64,
    pub unit: String,
    #[serde(default)]
    pub cost: Money,
}

struct Resolved {
    draft: ProductionDraft,
    produced: ResolvedLine,
    lines: Vec<ResolvedLine>,
}

async fn resolve(state: &AppState, payload: &ProductionPayload) -> ApiResult<Resolved> {
    if payload.number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "number".to_string(),
        }
        .into());
    }
    validate_quantity("produced_qty", payload.produced_qty)?;
    validate_amount("total_cost", payload.total_cost)?;
    validate_item_count(payload.items.len(), true)?;
    let production_date = parse_date("production_date", &payload.production_date)?;

    let produced = resolve_line(
        &state.db,
        &payload.produced_medicine_barcode,
        &payload.produced_unit,
        payload.produced_qty,
    )
    .await?;

    let mut lines = Vec::with_capacity(payload.items.len());
    let mut items = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        validate_amount("cost", item.cost)?;
        let line = resolve_line(&state.db, &item.barcode, &item.unit, item.qty).await?;
        items.push(ProductionItemDraft {
            medicine_id: line.medicine.id,
            qty: item.qty,
            unit_id: line.unit.id,
            cost: item.cost,
        });
        lines.push(line);
    }

    let draft = ProductionDraft {
        number: payload.number,
        produced_medicine_id: produced.medicine.id,
        produced_qty: payload.produced_qty,
        produced_unit_id: produced.unit.id,
        production_date,
        description: payload.description.trim().to_string(),
        updated_to_stock: payload.updated_to_stock,
        updated_to_account: payload.updated_to_account,
        total_cost: payload.total_cost,
        items,
    };

    Ok(Resolved {
        draft,
        produced,
        lines,
    })
}

async fn printable(state: &AppState, resolved: &Resolved, user: &User) -> ApiResult<PrintableDocument> {
    let draft = &resolved.draft;
    let mut doc = PrintableDocument::new(
        KIND.as_str(),
        KIND.title(),
        draft.number.to_string(),
        draft.production_date,
    );
    doc.header = letterhead(&state.db, user).await?;
    doc.header.push(Line::Text(format!(
        "Produced: {} {} {}",
        qty_text(draft.produced_qty),
        resolved.produced.unit.name,
        resolved.produced.medicine.name
    )));
    if !draft.description.is_empty() {
        doc.header.push(Line::Text(draft.description.clone()));
    }
    doc.columns = vec!["Ingredient".into(), "Qty".into(), "Unit".into(), "Cost".into()];
    doc.rows = resolved
        .lines
        .iter()
        .zip(&draft.items)
        .map(|(line, item)| {
            vec![
                line.medicine.name.clone(),
                qty_text(item.qty),
                line.unit.name.clone(),
                money_text(item.cost),
            ]
        })
        .collect();
    doc.footer.push(Line::Heading(format!("Total cost: {}", money_text(draft.total_cost))));
    Ok(doc)
}

// =============================================================================
// Storage
// =============================================================================

pub(crate) struct Productions;

#[async_trait]
impl StockDocument for Productions {
    const KIND: DocumentKind = KIND;
    const NUMBER_FIELD: &'static str = "production number";

    type Draft = ProductionDraft;
    type Record = ProductionRecord;

    fn draft_number(draft: &ProductionDraft) -> String {
        draft.number.to_string()
    }

    fn draft_updates_stock(draft: &ProductionDraft) -> bool {
        draft.updated_to_stock
    }

    fn draft_movements(draft: &ProductionDraft) -> Vec<StockMovement> {
        draft.stock_movements()
    }

    fn record_id(record: &ProductionRecord) -> i64 {
        record.header.id
    }

    fn record_number(record: &ProductionRecord) -> String {
        record.header.number.to_string()
    }

    fn record_pdf(record: &ProductionRecord) -> Option<&str> {
        record.header.pdf_url.as_deref()
    }

    fn record_movements(record: &ProductionRecord) -> Vec<StockMovement> {
        record.applied_movements()
    }

    fn snapshot(record: &ProductionRecord) -> DocumentSnapshot {
        DocumentSnapshot::Production(record.clone())
    }

    async fn number_in_use(db: &Database, draft: &ProductionDraft, excluding: Option<i64>) -> DbResult<bool> {
        db.productions().number_in_use(draft.number, excluding).await
    }

    async fn insert(db: &Database, draft: &ProductionDraft, actor: i64) -> DbResult<i64> {
        Ok(db.productions().insert(draft, actor).await?.id)
    }

    async fn update_header(db: &Database, id: i64, draft: &ProductionDraft, actor: i64) -> DbResult<()> {
        db.productions().update_header(id, draft, actor).await.map(drop)
    }

    async fn insert_items(db: &Database, id: i64, draft: &ProductionDraft) -> DbResult<()> {
        db.productions().insert_items(id, &draft.items).await.map(drop)
    }

    async fn replace_items(db: &Database, id: i64, draft: &ProductionDraft) -> DbResult<()> {
        db.productions().replace_items(id, &draft.items).await.map(drop)
    }

    async fn set_pdf_url(db: &Database, id: i64, path: &str) -> DbResult<()> {
        db.productions().set_pdf_url(id, Some(path)).await
    }

    async fn soft_delete(db: &Database, id: i64, actor: i64) -> DbResult<()> {
        db.productions().soft_delete(id, actor).await
    }

    async fn get_record(db: &Database, id: i64) -> DbResult<Option<ProductionRecord>> {
        db.productions().get_record(id).await
    }
}

// =============================================================================
// Flows
// =============================================================================

pub async fn create(state: &AppState, payload: ProductionPayload, user: &User) -> ApiResult<ProductionRecord> {
    let resolved = resolve(state, &payload).await?;
    let document = printable(state, &resolved, user).await?;
    flow::create::<Productions>(state, &resolved.draft, &document, user).await
}

pub async fn modify(
    state: &AppState,
    id: i64,
    payload: ProductionPayload,
    user: &User,
) -> ApiResult<ProductionRecord> {
    let old = flow::load::<Productions>(state, id).await?;
    let resolved = resolve(state, &payload).await?;
    let document = printable(state, &resolved, user).await?;
    flow::modify::<Productions>(state, &old, &resolved.draft, &document, user).await
}

pub async fn delete(state: &AppState, id: i64, user: &User) -> ApiResult<()> {
    flow::delete::<Productions>(state, id, user).await
}

pub async fn detail(state: &AppState, id: i64) -> ApiResult<ProductionRecord> {
    flow::load::<Productions>(state, id).await
}
