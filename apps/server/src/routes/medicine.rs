//! `/medicine` and `/unit`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use pharmacon_core::validation::{validate_barcode, validate_factor, validate_name, validate_opening_stock};
use pharmacon_core::{Medicine, Unit, UnitConversion, ValidationError};
use pharmacon_db::Database;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::services::{resolve_medicine, resolve_unit};
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: u32 = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/medicine", post(create).get(search))
        .route("/medicine/conversion", post(set_conversion))
        .route("/medicine/{barcode}", get(detail))
        .route("/unit", get(units))
}

#[derive(Debug, Deserialize)]
pub struct CreateMedicine {
    pub barcode: String,
    pub name: String,
    pub base_unit: String,
    #[serde(default)]
    pub qty: f64,
    #[serde(default)]
    pub conversions: Vec<ConversionInput>,
}

#[derive(Debug, Deserialize)]
pub struct ConversionInput {
    pub unit: String,
    pub factor: f64,
}

#[derive(Debug, Deserialize)]
pub struct SetConversion {
    pub barcode: String,
    pub unit: String,
    pub factor: f64,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

/// A medicine with its base unit and every stored conversion.
#[derive(Debug, Serialize)]
pub struct MedicineDetail {
    #[serde(flatten)]
    pub medicine: Medicine,
    pub base_unit: Unit,
    pub conversions: Vec<ConversionView>,
}

#[derive(Debug, Serialize)]
pub struct ConversionView {
    pub unit: String,
    pub factor: f64,
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateMedicine>,
) -> ApiResult<(StatusCode, Json<MedicineDetail>)> {
    validate_barcode(&req.barcode)?;
    validate_name("name", &req.name)?;
    validate_opening_stock(req.qty)?;
    for conversion in &req.conversions {
        validate_factor(conversion.factor)?;
    }

    let base_unit = resolve_unit(&state.db, &req.base_unit).await?;
    let medicine = state
        .db
        .medicines()
        .insert(req.barcode.trim(), req.name.trim(), req.qty, base_unit.id, Some(user.id))
        .await?;

    for conversion in &req.conversions {
        let unit = resolve_unit(&state.db, &conversion.unit).await?;
        ensure_not_base(&medicine, &unit)?;
        state
            .db
            .medicines()
            .set_conversion(medicine.id, unit.id, conversion.factor)
            .await?;
    }

    info!(barcode = %medicine.barcode, qty = medicine.qty, by = %user.name, "Medicine created");
    let detail = describe(&state.db, medicine).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn search(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Medicine>>> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    Ok(Json(state.db.medicines().search(&query.q, limit).await?))
}

async fn detail(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(barcode): Path<String>,
) -> ApiResult<Json<MedicineDetail>> {
    let medicine = resolve_medicine(&state.db, &barcode).await?;
    Ok(Json(describe(&state.db, medicine).await?))
}

async fn set_conversion(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SetConversion>,
) -> ApiResult<Json<UnitConversion>> {
    validate_factor(req.factor)?;
    let medicine = resolve_medicine(&state.db, &req.barcode).await?;
    let unit = resolve_unit(&state.db, &req.unit).await?;
    ensure_not_base(&medicine, &unit)?;

    let conversion = state
        .db
        .medicines()
        .set_conversion(medicine.id, unit.id, req.factor)
        .await?;
    info!(barcode = %medicine.barcode, unit = %unit.name, factor = req.factor, by = %user.name, "Conversion set");
    Ok(Json(conversion))
}

async fn units(State(state): State<AppState>, CurrentUser(_): CurrentUser) -> ApiResult<Json<Vec<Unit>>> {
    Ok(Json(state.db.units().list().await?))
}

/// The base unit always converts at 1.
fn ensure_not_base(medicine: &Medicine, unit: &Unit) -> ApiResult<()> {
    if unit.id == medicine.base_unit_id {
        return Err(ValidationError::NotAllowed {
            field: "unit".to_string(),
            reason: format!("'{}' is the base unit of {}", unit.name, medicine.barcode),
        }
        .into());
    }
    Ok(())
}

async fn describe(db: &Database, medicine: Medicine) -> ApiResult<MedicineDetail> {
    let base_unit = db
        .units()
        .get_by_id(medicine.base_unit_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Unit", &medicine.base_unit_id.to_string()))?;

    let mut conversions = Vec::new();
    for conversion in db.medicines().conversions(medicine.id).await? {
        if let Some(unit) = db.units().get_by_id(conversion.unit_id).await? {
            conversions.push(ConversionView {
                unit: unit.name,
                factor: conversion.factor,
            });
        }
    }

    Ok(MedicineDetail {
        medicine,
        base_unit,
        conversions,
    })
}
