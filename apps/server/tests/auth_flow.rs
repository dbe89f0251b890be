//! Login, session and admin-gate behavior through the HTTP router.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{TestApp, ADMIN, ADMIN_PASSWORD};
use pharmacon_server::auth::TokenIssuer;

#[tokio::test]
async fn test_login_then_current_user() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let (status, body) = app.get("/user/current", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], ADMIN);
    assert_eq!(body["admin"], true);
    assert!(body.get("password_hash").is_none());
    assert!(!body["last_logged_in"].is_null());
}

#[tokio::test]
async fn test_wrong_password_persists_nothing() {
    let app = TestApp::new().await;
    let id = app.create_user(ADMIN, ADMIN_PASSWORD, true).await;

    let (status, body) = app.login(ADMIN, "not-the-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    assert_eq!(app.db.tokens().count_for_user(id).await.unwrap(), 0);

    let (status, _) = app.login("nobody", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_and_garbage_tokens_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/user/current", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "no valid token provided");

    let (status, _) = app.get("/user/current", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_session_is_deleted_when_presented() {
    let app = TestApp::new().await;
    let id = app.create_user("cashier", "cashier-pass", false).await;

    let issuer = TokenIssuer::new(&app.config.token_secret, app.config.token_ttl_secs);
    let stale = issuer
        .issue_at(id, false, Utc::now() - Duration::days(2))
        .unwrap();
    app.db.tokens().save(&stale.session).await.unwrap();
    assert_eq!(app.db.tokens().count_for_user(id).await.unwrap(), 1);

    let (status, body) = app.get("/user/current", &stale.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token expired, log in again");
    assert_eq!(app.db.tokens().count_for_user(id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_logout_twice_is_harmless() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let (status, _) = app.post("/user/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // the session is gone, so a second logout is refused at the gate
    let (status, _) = app.post("/user/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/user/current", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_forbid_regular_users() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .post(
            "/user/register",
            &admin,
            json!({
                "name": "cashier",
                "password": "cashier-pass",
                "admin_password": ADMIN_PASSWORD,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.login("cashier", "cashier-pass").await;
    let cashier = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/user", &cashier).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "admin access required");

    let (status, body) = app.get("/user", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_register_rechecks_admin_password() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .post(
            "/user/register",
            &admin,
            json!({ "name": "cashier", "password": "cashier-pass", "admin_password": "guess" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.db.users().get_by_name("cashier").await.unwrap().is_none());
}

#[tokio::test]
async fn test_init_admin_only_on_empty_database() {
    let app = TestApp::new().await;

    let credentials = json!({ "name": "owner", "password": "owner-pass" });
    let (status, body) = app
        .send(Method::POST, "/user/init-admin", None, Some(credentials.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["admin"], true);

    let (status, _) = app
        .send(Method::POST, "/user/init-admin", None, Some(credentials))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_a_user_ends_their_sessions() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let cashier_id = app.create_user("cashier", "cashier-pass", false).await;
    let (_, body) = app.login("cashier", "cashier-pass").await;
    let cashier = body["token"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(Method::DELETE, "/user", Some(&admin), Some(json!({ "id": cashier_id, "admin_password": ADMIN_PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.db.tokens().count_for_user(cashier_id).await.unwrap(), 0);

    let (status, _) = app.get("/user/current", &cashier).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_first_user_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let first = app.db.users().first_user_id().await.unwrap().unwrap();
    app.create_user("cashier", "cashier-pass", false).await;

    let (status, _) = app
        .send(Method::DELETE, "/user", Some(&admin), Some(json!({ "id": first, "admin_password": ADMIN_PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.db.users().get_by_id(first).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_user_rechecks_admin_password() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let cashier_id = app.create_user("cashier", "cashier-pass", false).await;
    let (_, body) = app.login("cashier", "cashier-pass").await;
    let cashier = body["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::DELETE, "/user", Some(&admin), Some(json!({ "id": cashier_id, "admin_password": "guess" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("admin_password"));

    assert!(app.db.users().get_by_id(cashier_id).await.unwrap().is_some());
    let (status, _) = app.get("/user/current", &cashier).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_unknown_user_is_not_found() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_user("cashier", "cashier-pass", false).await;

    let (status, _) = app
        .send(Method::DELETE, "/user", Some(&admin), Some(json!({ "id": 999, "admin_password": ADMIN_PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_flag_change_rechecks_admin_password() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let cashier_id = app.create_user("cashier", "cashier-pass", false).await;

    let (status, _) = app
        .patch("/user/admin", &admin, json!({ "id": cashier_id, "admin": true, "admin_password": "guess" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!app.db.users().get_by_id(cashier_id).await.unwrap().unwrap().admin);

    let (status, _) = app
        .patch("/user/admin", &admin, json!({ "id": 999, "admin": true, "admin_password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .patch("/user/admin", &admin, json!({ "id": cashier_id, "admin": true, "admin_password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(app.db.users().get_by_id(cashier_id).await.unwrap().unwrap().admin);
}

#[tokio::test]
async fn test_user_detail_by_id() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let cashier_id = app.create_user("cashier", "cashier-pass", false).await;

    let (status, body) = app.post("/user/detail", &admin, json!({ "id": cashier_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "cashier");
    assert!(body.get("password_hash").is_none());

    let (status, _) = app.post("/user/detail", &admin, json!({ "id": 999 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.login("cashier", "cashier-pass").await;
    let cashier = body["token"].as_str().unwrap().to_string();
    let (status, _) = app.post("/user/detail", &cashier, json!({ "id": cashier_id })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
