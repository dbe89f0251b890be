//! `/user`: login, logout and account administration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use pharmacon_core::validation::{validate_name, validate_password};
use pharmacon_core::{User, ValidationError};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AdminUser, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list).patch(modify).delete(remove))
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/user/init-admin", post(init_admin))
        .route("/user/register", post(register))
        .route("/user/current", get(current))
        .route("/user/detail", post(detail))
        .route("/user/admin", patch(set_admin))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub admin: bool,
    /// The calling admin's own password.
    #[serde(default)]
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ModifyRequest {
    pub id: i64,
    pub name: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub admin: Option<bool>,
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub id: i64,
    pub admin: bool,
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub id: i64,
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DetailRequest {
    pub id: i64,
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<Value>> {
    let (_, details) = state.gate.login(req.name.trim(), &req.password).await?;
    Ok(Json(json!({ "token": details.token })))
}

async fn logout(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<Value>> {
    state.gate.revoke(user.id).await?;
    Ok(Json(json!({ "status": "logged out" })))
}

/// Creates the first account. Refused once any user exists.
async fn init_admin(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    if state.db.users().count().await? > 0 {
        return Err(ValidationError::NotAllowed {
            field: "init-admin".to_string(),
            reason: "users already exist".to_string(),
        }
        .into());
    }
    validate_name("name", &req.name)?;
    validate_password(&req.password)?;

    let hash = hash_password(&req.password)?;
    let user = state.db.users().insert(req.name.trim(), &hash, true, "").await?;
    info!(user_id = user.id, name = %user.name, "Initial admin created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn register(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    confirm_admin_password(&admin, &req.admin_password)?;
    validate_name("name", &req.name)?;
    validate_password(&req.password)?;

    let hash = hash_password(&req.password)?;
    let user = state
        .db
        .users()
        .insert(req.name.trim(), &hash, req.admin, req.phone_number.trim())
        .await?;
    info!(user_id = user.id, name = %user.name, by = %admin.name, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn current(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn list(State(state): State<AppState>, AdminUser(_): AdminUser) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.db.users().list().await?))
}

async fn modify(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ModifyRequest>,
) -> ApiResult<Json<User>> {
    confirm_admin_password(&admin, &req.admin_password)?;

    let mut user = find_user(&state, req.id).await?;

    if let Some(name) = req.name {
        validate_name("name", &name)?;
        user.name = name.trim().to_string();
    }
    if let Some(password) = req.password {
        validate_password(&password)?;
        user.password_hash = hash_password(&password)?;
    }
    if let Some(phone) = req.phone_number {
        user.phone_number = phone.trim().to_string();
    }
    if let Some(flag) = req.admin {
        user.admin = flag;
    }

    let user = state.db.users().update(&user).await?;
    info!(user_id = user.id, by = %admin.name, "User modified");
    Ok(Json(user))
}

async fn detail(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<DetailRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(find_user(&state, req.id).await?))
}

async fn set_admin(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<SetAdminRequest>,
) -> ApiResult<Json<Value>> {
    confirm_admin_password(&admin, &req.admin_password)?;
    find_user(&state, req.id).await?;

    state.db.users().set_admin(req.id, req.admin).await?;
    info!(user_id = req.id, admin = req.admin, by = %admin.name, "Admin flag changed");
    Ok(Json(json!({ "id": req.id, "admin": req.admin })))
}

/// Deletes an account and ends its sessions. The first-created user and
/// the last remaining user are kept.
async fn remove(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<DeleteRequest>,
) -> ApiResult<StatusCode> {
    confirm_admin_password(&admin, &req.admin_password)?;
    find_user(&state, req.id).await?;

    let users = state.db.users();
    if users.first_user_id().await? == Some(req.id) {
        return Err(not_deletable("the first user cannot be deleted"));
    }
    if users.count().await? <= 1 {
        return Err(not_deletable("the last user cannot be deleted"));
    }

    state.gate.revoke(req.id).await?;
    users.delete(req.id).await?;
    info!(user_id = req.id, by = %admin.name, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_user(state: &AppState, id: i64) -> ApiResult<User> {
    state
        .db
        .users()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &id.to_string()))
}

fn confirm_admin_password(admin: &User, password: &str) -> ApiResult<()> {
    if verify_password(password, &admin.password_hash) {
        Ok(())
    } else {
        Err(ValidationError::NotAllowed {
            field: "admin_password".to_string(),
            reason: "does not match".to_string(),
        }
        .into())
    }
}

fn not_deletable(reason: &str) -> ApiError {
    ValidationError::NotAllowed {
        field: "id".to_string(),
        reason: reason.to_string(),
    }
    .into()
}
