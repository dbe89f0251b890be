//! Shared harness for router tests: in-memory SQLite, a scratch document
//! directory and helpers that drive the router with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use pharmacon_core::{Medicine, Unit};
use pharmacon_db::{Database, DbConfig};
use pharmacon_server::auth::password::hash_password;
use pharmacon_server::document::DocumentRenderer;
use pharmacon_server::{router, AppState, ServerConfig};

pub const ADMIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-pass";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub config: ServerConfig,
    _dir: TempDir,
}

impl TestApp {
    /// Writes PDFs into a temporary directory.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_renderer(renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self::build(Some(renderer)).await
    }

    async fn build(renderer: Option<Arc<dyn DocumentRenderer>>) -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ServerConfig {
            document_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let state = match renderer {
            Some(renderer) => AppState::with_renderer(db.clone(), config.clone(), renderer),
            None => AppState::new(db.clone(), config.clone()),
        };
        TestApp {
            router: router(state),
            db,
            config,
            _dir: dir,
        }
    }

    /// Sends one request; the body is parsed as JSON when there is one.
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates a user directly in the database.
    pub async fn create_user(&self, name: &str, password: &str, admin: bool) -> i64 {
        let hash = hash_password(password).unwrap();
        self.db.users().insert(name, &hash, admin, "").await.unwrap().id
    }

    pub async fn login(&self, name: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/user/login",
            None,
            Some(serde_json::json!({ "name": name, "password": password })),
        )
        .await
    }

    /// Creates the admin account and returns a live token for it.
    pub async fn admin_token(&self) -> String {
        self.create_user(ADMIN, ADMIN_PASSWORD, true).await;
        let (status, body) = self.login(ADMIN, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Paracetamol stocked in tablets, 10 tablets per strip.
    pub async fn paracetamol(&self, qty: f64) -> (Medicine, Unit) {
        let tablet = self.db.units().get_or_create("tablet").await.unwrap();
        let strip = self.db.units().get_or_create("strip").await.unwrap();
        let medicine = self
            .db
            .medicines()
            .insert("PARA-500", "Paracetamol 500 mg", qty, tablet.id, None)
            .await
            .unwrap();
        self.db
            .medicines()
            .set_conversion(medicine.id, strip.id, 10.0)
            .await
            .unwrap();
        (medicine, tablet)
    }

    pub async fn stock(&self, medicine_id: i64) -> f64 {
        self.db.medicines().quantity(medicine_id).await.unwrap().unwrap()
    }
}
