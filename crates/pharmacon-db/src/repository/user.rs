//! # User Repository
//!
//! Login identities. Password hashes are stored as Argon2 PHC strings;
//! hashing happens in the server, never here.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmacon_core::User;

const USER_COLUMNS: &str =
    "id, name, password_hash, admin, phone_number, last_logged_in, created_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Number of users. Zero means the bootstrap admin may be created.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE name = ?1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// All users, oldest first.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Inserts a user.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the name is taken
    pub async fn insert(
        &self,
        name: &str,
        password_hash: &str,
        admin: bool,
        phone_number: &str,
    ) -> DbResult<User> {
        debug!(name = %name, admin, "Inserting user");

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, password_hash, admin, phone_number, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(password_hash)
        .bind(admin)
        .bind(phone_number)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("name", name))?;

        Ok(user)
    }

    /// Writes back name, hash, admin flag and phone number.
    pub async fn update(&self, user: &User) -> DbResult<User> {
        debug!(user_id = user.id, "Updating user");

        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = ?2,
                password_hash = ?3,
                admin = ?4,
                phone_number = ?5
            WHERE id = ?1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.admin)
        .bind(&user.phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("name", &user.name))?;

        updated.ok_or_else(|| DbError::not_found("User", user.id))
    }

    pub async fn set_admin(&self, id: i64, admin: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET admin = ?2 WHERE id = ?1")
            .bind(id)
            .bind(admin)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_logged_in = ?2 WHERE id = ?1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes a user. Their token rows go with them (ON DELETE CASCADE).
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(user_id = id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Id of the first-created user, which may never be deleted.
    pub async fn first_user_id(&self) -> DbResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT MIN(id) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::fixtures;
    use crate::DbError;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = fixtures::db().await;
        let users = db.users();

        assert_eq!(users.count().await.unwrap(), 0);
        let admin = users.insert("admin", "$argon2id$x", true, "").await.unwrap();

        assert!(admin.admin);
        assert_eq!(users.count().await.unwrap(), 1);
        assert_eq!(users.get_by_name("admin").await.unwrap().unwrap().id, admin.id);
        assert_eq!(users.first_user_id().await.unwrap(), Some(admin.id));
        assert!(users.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let db = fixtures::db().await;
        db.users().insert("ana", "h", false, "").await.unwrap();

        let err = db.users().insert("ana", "h", false, "").await.unwrap_err();
        assert_eq!(err.to_string(), "Duplicate name: 'ana' already exists");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = fixtures::db().await;
        let users = db.users();
        let mut user = users.insert("budi", "h", false, "").await.unwrap();

        user.phone_number = "0812".to_string();
        let updated = users.update(&user).await.unwrap();
        assert_eq!(updated.phone_number, "0812");

        users.set_admin(user.id, true).await.unwrap();
        assert!(users.get_by_id(user.id).await.unwrap().unwrap().admin);

        users.delete(user.id).await.unwrap();
        assert!(matches!(
            users.delete(user.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
