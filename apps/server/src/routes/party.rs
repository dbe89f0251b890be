//! `/customer`, `/supplier` and `/company-profile`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use pharmacon_core::validation::validate_name;
use pharmacon_core::{CompanyProfile, CompanyProfileDraft, Customer, Supplier, SupplierDraft};

use crate::auth::{AdminUser, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customer", post(create_customer).get(search_customers))
        .route("/customer/{id}", patch(rename_customer).delete(delete_customer))
        .route("/supplier", post(create_supplier).get(search_suppliers))
        .route("/supplier/{id}", patch(update_supplier).delete(delete_supplier))
        .route("/company-profile", get(company_profile).put(save_company_profile))
}

#[derive(Debug, Deserialize)]
pub struct CustomerInput {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

// =============================================================================
// Customers
// =============================================================================

async fn create_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CustomerInput>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    validate_name("name", &req.name)?;
    let customer = state.db.customers().insert(req.name.trim()).await?;
    info!(customer_id = customer.id, by = %user.name, "Customer created");
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn search_customers(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<NameQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    let name = query.name.as_deref().filter(|n| !n.trim().is_empty());
    Ok(Json(state.db.customers().search(name).await?))
}

async fn rename_customer(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<CustomerInput>,
) -> ApiResult<Json<Customer>> {
    validate_name("name", &req.name)?;
    Ok(Json(state.db.customers().rename(id, req.name.trim()).await?))
}

async fn delete_customer(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db.customers().delete(id).await?;
    info!(customer_id = id, by = %user.name, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Suppliers
// =============================================================================

async fn create_supplier(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<SupplierDraft>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    validate_name("name", &draft.name)?;
    let supplier = state.db.suppliers().insert(&draft, user.id).await?;
    info!(supplier_id = supplier.id, by = %user.name, "Supplier created");
    Ok((StatusCode::CREATED, Json(supplier)))
}

async fn search_suppliers(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<NameQuery>,
) -> ApiResult<Json<Vec<Supplier>>> {
    let name = query.name.as_deref().filter(|n| !n.trim().is_empty());
    Ok(Json(state.db.suppliers().search(name).await?))
}

async fn update_supplier(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(draft): Json<SupplierDraft>,
) -> ApiResult<Json<Supplier>> {
    validate_name("name", &draft.name)?;
    Ok(Json(state.db.suppliers().update(id, &draft, user.id).await?))
}

async fn delete_supplier(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db.suppliers().delete(id).await?;
    info!(supplier_id = id, by = %user.name, "Supplier deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Company profile
// =============================================================================

async fn company_profile(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> ApiResult<Json<CompanyProfile>> {
    let profile = state
        .db
        .company_profile()
        .get()
        .await?
        .ok_or_else(|| ApiError::not_found("Company profile", "1"))?;
    Ok(Json(profile))
}

async fn save_company_profile(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(draft): Json<CompanyProfileDraft>,
) -> ApiResult<Json<CompanyProfile>> {
    validate_name("name", &draft.name)?;
    let profile = state.db.company_profile().upsert(&draft, user.id).await?;
    info!(by = %user.name, "Company profile saved");
    Ok(Json(profile))
}
