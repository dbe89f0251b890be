//! `/production`, `/invoice`, `/purchase-invoice` and `/prescription`.
//!
//! ```text
//! POST   /{kind}              create          201 + record
//! GET    /{kind}?start=&end=  list headers
//! GET    /{kind}/{id}         header + items
//! PATCH  /{kind}/{id}         modify
//! DELETE /{kind}/{id}         delete (admin)  204
//! GET    /{kind}/{id}/print   stored PDF bytes
//! ```

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use pharmacon_core::validation::{parse_date, validate_item_count, validate_name, validate_quantity};
use pharmacon_core::{
    Invoice, InvoiceRecord, Production, ProductionRecord, PurchaseInvoice, PurchaseInvoiceRecord,
};

use crate::auth::{AdminUser, CurrentUser};
use crate::document::{render_blocking, Line, PrintableDocument};
use crate::error::{ApiError, ApiResult};
use crate::services::invoice::{self, InvoicePayload};
use crate::services::production::{self, ProductionPayload};
use crate::services::purchase::{self, PurchasePayload};
use crate::services::{letterhead, qty_text, DocumentQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/production", post(create_production).get(list_productions))
        .route(
            "/production/{id}",
            get(production_detail).patch(modify_production).delete(delete_production),
        )
        .route("/production/{id}/print", get(print_production))
        .route("/invoice", post(create_invoice).get(list_invoices))
        .route(
            "/invoice/{id}",
            get(invoice_detail).patch(modify_invoice).delete(delete_invoice),
        )
        .route("/invoice/{id}/print", get(print_invoice))
        .route("/purchase-invoice", post(create_purchase).get(list_purchases))
        .route(
            "/purchase-invoice/{id}",
            get(purchase_detail).patch(modify_purchase).delete(delete_purchase),
        )
        .route("/purchase-invoice/{id}/print", get(print_purchase))
        .route("/prescription/print", post(print_prescription))
}

/// Reads a rendered document back from disk.
async fn serve_pdf(entity: &str, id: i64, pdf_url: Option<&str>) -> ApiResult<Response> {
    let path = pdf_url.ok_or_else(|| ApiError::not_found(&format!("{} document", entity), &id.to_string()))?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        warn!(path = %path, error = %e, "Stored document is unreadable");
        ApiError::not_found(&format!("{} document", entity), &id.to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}

// =============================================================================
// Production
// =============================================================================

async fn create_production(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ProductionPayload>,
) -> ApiResult<(StatusCode, Json<ProductionRecord>)> {
    let record = production::create(&state, payload, &user).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_productions(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<DocumentQuery>,
) -> ApiResult<Json<Vec<Production>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.db.productions().list(&filter).await?))
}

async fn production_detail(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProductionRecord>> {
    Ok(Json(production::detail(&state, id).await?))
}

async fn modify_production(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<ProductionPayload>,
) -> ApiResult<Json<ProductionRecord>> {
    Ok(Json(production::modify(&state, id, payload, &user).await?))
}

async fn delete_production(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    production::delete(&state, id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn print_production(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let record = production::detail(&state, id).await?;
    serve_pdf("Production", id, record.header.pdf_url.as_deref()).await
}

// =============================================================================
// Sales invoices
// =============================================================================

async fn create_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<InvoicePayload>,
) -> ApiResult<(StatusCode, Json<InvoiceRecord>)> {
    let record = invoice::create(&state, payload, &user).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_invoices(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<DocumentQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.db.invoices().list(&filter).await?))
}

async fn invoice_detail(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<InvoiceRecord>> {
    Ok(Json(invoice::detail(&state, id).await?))
}

async fn modify_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<InvoicePayload>,
) -> ApiResult<Json<InvoiceRecord>> {
    Ok(Json(invoice::modify(&state, id, payload, &user).await?))
}

async fn delete_invoice(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    invoice::delete(&state, id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn print_invoice(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let record = invoice::detail(&state, id).await?;
    serve_pdf("Invoice", id, record.header.pdf_url.as_deref()).await
}

// =============================================================================
// Purchase invoices
// =============================================================================

async fn create_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PurchasePayload>,
) -> ApiResult<(StatusCode, Json<PurchaseInvoiceRecord>)> {
    let record = purchase::create(&state, payload, &user).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_purchases(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<DocumentQuery>,
) -> ApiResult<Json<Vec<PurchaseInvoice>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.db.purchase_invoices().list(&filter).await?))
}

async fn purchase_detail(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<PurchaseInvoiceRecord>> {
    Ok(Json(purchase::detail(&state, id).await?))
}

async fn modify_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<PurchasePayload>,
) -> ApiResult<Json<PurchaseInvoiceRecord>> {
    Ok(Json(purchase::modify(&state, id, payload, &user).await?))
}

async fn delete_purchase(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    purchase::delete(&state, id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn print_purchase(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let record = purchase::detail(&state, id).await?;
    serve_pdf("Purchase invoice", id, record.header.pdf_url.as_deref()).await
}

// =============================================================================
// Prescriptions
// =============================================================================

/// A prescription to print. Nothing is stored and no stock moves.
#[derive(Debug, Deserialize)]
pub struct PrescriptionPayload {
    pub number: String,
    pub patient_name: String,
    #[serde(default)]
    pub patient_age: Option<u32>,
    pub doctor_name: String,
    /// `YYYY-MM-DD`
    pub prescription_date: String,
    pub items: Vec<PrescriptionLine>,
}

#[derive(Debug, Deserialize)]
pub struct PrescriptionLine {
    pub medicine: String,
    pub qty: f64,
    pub unit: String,
    /// e.g. "3 x 1 after meals"
    #[serde(default)]
    pub dosage: String,
}

async fn print_prescription(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PrescriptionPayload>,
) -> ApiResult<Json<Value>> {
    validate_name("number", &payload.number)?;
    validate_name("patient_name", &payload.patient_name)?;
    validate_name("doctor_name", &payload.doctor_name)?;
    validate_item_count(payload.items.len(), false)?;
    let date = parse_date("prescription_date", &payload.prescription_date)?;
    for line in &payload.items {
        validate_name("medicine", &line.medicine)?;
        validate_quantity("qty", line.qty)?;
    }

    let mut doc = PrintableDocument::new("prescription", "Prescription", payload.number.trim(), date);
    doc.header = letterhead(&state.db, &user).await?;
    doc.header.push(Line::Text(format!("Doctor: {}", payload.doctor_name.trim())));
    doc.header.push(Line::Text(match payload.patient_age {
        Some(age) => format!("Patient: {} ({} y)", payload.patient_name.trim(), age),
        None => format!("Patient: {}", payload.patient_name.trim()),
    }));
    doc.columns = vec!["Medicine".into(), "Qty".into(), "Unit".into(), "Dosage".into()];
    doc.rows = payload
        .items
        .iter()
        .map(|line| {
            vec![
                line.medicine.trim().to_string(),
                qty_text(line.qty),
                line.unit.trim().to_string(),
                line.dosage.trim().to_string(),
            ]
        })
        .collect();

    let path = render_blocking(state.documents.clone(), doc).await?;
    info!(number = %payload.number.trim(), by = %user.name, "Prescription printed");
    Ok(Json(json!({ "pdf_url": path })))
}
