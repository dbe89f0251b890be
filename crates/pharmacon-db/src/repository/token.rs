//! # Token Repository
//!
//! Persisted session rows `(user_id, uuid, expired_at)`.
//!
//! A signed token is only honoured while its row exists, so logout is a
//! delete and expiry is enforced against the stored `expired_at`. Expired
//! rows are not swept; the auth gate deletes one when it is presented.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use pharmacon_core::SessionToken;

#[derive(Debug, Clone)]
pub struct TokenRepository {
    pool: SqlitePool,
}

impl TokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TokenRepository { pool }
    }

    /// Persists a freshly issued session.
    pub async fn save(&self, session: &SessionToken) -> DbResult<()> {
        debug!(user_id = session.user_id, expired_at = %session.expired_at, "Saving session token");

        sqlx::query("INSERT INTO verify_token (user_id, uuid, expired_at) VALUES (?1, ?2, ?3)")
            .bind(session.user_id)
            .bind(&session.uuid)
            .bind(session.expired_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Looks a session up by the `(uuid, user_id)` pair carried in its claims.
    pub async fn find(&self, uuid: &str, user_id: i64) -> DbResult<Option<SessionToken>> {
        let session = sqlx::query_as::<_, SessionToken>(
            r#"
            SELECT user_id, uuid, expired_at
            FROM verify_token
            WHERE uuid = ?1 AND user_id = ?2
            ORDER BY expired_at DESC
            LIMIT 1
            "#,
        )
        .bind(uuid)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Deletes the rows matching one session. Returns how many went.
    pub async fn delete(&self, uuid: &str, user_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM verify_token WHERE uuid = ?1 AND user_id = ?2")
            .bind(uuid)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Deletes every session of a user. Deleting nothing is not an error.
    pub async fn delete_for_user(&self, user_id: i64) -> DbResult<u64> {
        debug!(user_id, "Revoking all session tokens");

        let result = sqlx::query("DELETE FROM verify_token WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_user(&self, user_id: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verify_token WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
