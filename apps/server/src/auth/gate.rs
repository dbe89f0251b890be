//! # Token Gate
//!
//! Every protected route passes through [`AuthGate::validate`].
//!
//! ```text
//! headers ──► extract claims ──fail──► NoToken
//!                  │
//!                  ▼
//!        stored (uuid, user_id) row
//!                  │
//!   absent or now >= expired_at ──► delete row (best-effort) ──► Expired
//!                  │
//!                  ▼
//!             user by id ──absent──► UserNotFound
//!                  │
//!   admin required, user not admin ──► Forbidden
//!                  │
//!                  ▼
//!                User
//! ```
//!
//! Expiry is lazy: a row is only removed when someone presents it.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use pharmacon_core::{AuthError, User};
use pharmacon_db::Database;

use crate::auth::password::verify_password;
use crate::auth::tokens::{TokenDetails, TokenIssuer};
use crate::error::ApiError;

pub struct AuthGate {
    db: Database,
    issuer: TokenIssuer,
}

impl AuthGate {
    pub fn new(db: Database, issuer: TokenIssuer) -> Self {
        AuthGate { db, issuer }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Resolves the caller of a request.
    pub async fn validate(&self, headers: &HeaderMap, require_admin: bool) -> Result<User, ApiError> {
        self.validate_at(headers, require_admin, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        headers: &HeaderMap,
        require_admin: bool,
        now: DateTime<Utc>,
    ) -> Result<User, ApiError> {
        let claims = match self.issuer.extract(headers) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Rejecting request without usable token");
                return Err(AuthError::NoToken.into());
            }
        };

        let session = self.db.tokens().find(&claims.uuid, claims.user_id).await?;
        let live = session.as_ref().is_some_and(|s| s.is_live_at(now));
        if !live {
            if let Err(e) = self.db.tokens().delete(&claims.uuid, claims.user_id).await {
                warn!(user_id = claims.user_id, error = %e, "Failed to delete expired token");
            }
            debug!(user_id = claims.user_id, "Token expired or revoked");
            return Err(AuthError::Expired.into());
        }

        let user = self
            .db
            .users()
            .get_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound(claims.user_id))?;

        if require_admin && !user.admin {
            debug!(user_id = user.id, "Admin route refused");
            return Err(AuthError::Forbidden.into());
        }

        Ok(user)
    }

    /// Checks a name and password and opens a new session.
    ///
    /// Nothing is written when the credentials are wrong.
    pub async fn login(&self, name: &str, password: &str) -> Result<(User, TokenDetails), ApiError> {
        let user = self
            .db
            .users()
            .get_by_name(name)
            .await?
            .filter(|user| verify_password(password, &user.password_hash))
            .ok_or(AuthError::InvalidCredentials)?;

        let details = self.issuer.issue(user.id, user.admin)?;
        self.db.tokens().save(&details.session).await?;
        self.db.users().touch_last_login(user.id, Utc::now()).await?;

        info!(user_id = user.id, name = %user.name, "User logged in");
        Ok((user, details))
    }

    /// Ends every session of a user. Idempotent.
    pub async fn revoke(&self, user_id: i64) -> Result<u64, ApiError> {
        let removed = self.db.tokens().delete_for_user(user_id).await?;
        info!(user_id, removed, "Sessions revoked");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use chrono::Duration;
    use pharmacon_core::SessionToken;
    use pharmacon_db::DbConfig;

    async fn gate() -> (AuthGate, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let gate = AuthGate::new(db.clone(), TokenIssuer::new("test-secret", 3600));
        (gate, db)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    async fn user(db: &Database, name: &str, admin: bool) -> User {
        let hash = hash_password("pw1234").unwrap();
        db.users().insert(name, &hash, admin, "").await.unwrap()
    }

    #[tokio::test]
    async fn test_live_token_returns_user() {
        let (gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;
        let (_, details) = gate.login("alice", "pw1234").await.unwrap();

        let found = gate.validate(&bearer(&details.token), false).await.unwrap();
        assert_eq!(found.id, alice.id);
    }

    #[tokio::test]
    async fn test_missing_header_is_no_token() {
        let (gate, _db) = gate().await;
        let err = gate.validate(&HeaderMap::new(), false).await.unwrap_err();
        assert_eq!(err.message, AuthError::NoToken.to_string());
    }

    #[tokio::test]
    async fn test_expired_row_is_deleted_when_presented() {
        let (gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;
        let past = Utc::now() - Duration::hours(3);
        let details = gate.issuer().issue_at(alice.id, false, past).unwrap();
        db.tokens().save(&details.session).await.unwrap();

        let err = gate.validate(&bearer(&details.token), false).await.unwrap_err();
        assert_eq!(err.message, AuthError::Expired.to_string());
        assert_eq!(db.tokens().count_for_user(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_untouched_expired_row_stays() {
        let (_gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;
        db.tokens()
            .save(&SessionToken {
                user_id: alice.id,
                uuid: "stale".to_string(),
                expired_at: Utc::now() - Duration::days(1),
            })
            .await
            .unwrap();

        assert_eq!(db.tokens().count_for_user(alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;
        let details = gate.issuer().issue(alice.id, false).unwrap();
        db.tokens().save(&details.session).await.unwrap();

        let just_before = details.session.expired_at - Duration::seconds(1);
        assert!(gate.validate_at(&bearer(&details.token), false, just_before).await.is_ok());

        let at_expiry = details.session.expired_at;
        assert!(gate.validate_at(&bearer(&details.token), false, at_expiry).await.is_err());
    }

    #[tokio::test]
    async fn test_unsaved_token_is_expired() {
        let (gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;
        let details = gate.issuer().issue(alice.id, false).unwrap();

        let err = gate.validate(&bearer(&details.token), false).await.unwrap_err();
        assert_eq!(err.message, AuthError::Expired.to_string());
    }

    #[tokio::test]
    async fn test_admin_required() {
        let (gate, db) = gate().await;
        user(&db, "root", true).await;
        user(&db, "clerk", false).await;

        let (_, clerk) = gate.login("clerk", "pw1234").await.unwrap();
        let err = gate.validate(&bearer(&clerk.token), true).await.unwrap_err();
        assert_eq!(err.message, AuthError::Forbidden.to_string());

        let (_, root) = gate.login("root", "pw1234").await.unwrap();
        assert!(gate.validate(&bearer(&root.token), true).await.unwrap().admin);
    }

    #[tokio::test]
    async fn test_deleted_user_loses_sessions() {
        let (gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;
        let (_, details) = gate.login("alice", "pw1234").await.unwrap();
        db.users().delete(alice.id).await.unwrap();

        let err = gate.validate(&bearer(&details.token), false).await.unwrap_err();
        assert_eq!(err.message, AuthError::Expired.to_string());
    }

    #[tokio::test]
    async fn test_wrong_password_persists_nothing() {
        let (gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;

        let err = gate.login("alice", "nope").await.unwrap_err();
        assert_eq!(err.message, AuthError::InvalidCredentials.to_string());
        assert!(gate.login("nobody", "pw1234").await.is_err());
        assert_eq!(db.tokens().count_for_user(alice.id).await.unwrap(), 0);
        assert!(db.users().get_by_id(alice.id).await.unwrap().unwrap().last_logged_in.is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (gate, db) = gate().await;
        let alice = user(&db, "alice", false).await;
        gate.login("alice", "pw1234").await.unwrap();
        gate.login("alice", "pw1234").await.unwrap();

        assert_eq!(gate.revoke(alice.id).await.unwrap(), 2);
        assert_eq!(gate.revoke(alice.id).await.unwrap(), 0);
        assert_eq!(db.tokens().count_for_user(alice.id).await.unwrap(), 0);
    }
}
