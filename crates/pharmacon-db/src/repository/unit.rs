//! # Unit Repository
//!
//! Units of measure. Names are unique ignoring ASCII case, and handlers
//! create units on demand the first time a name is used.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmacon_core::Unit;

#[derive(Debug, Clone)]
pub struct UnitRepository {
    pool: SqlitePool,
}

impl UnitRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UnitRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Unit>> {
        let unit = sqlx::query_as::<_, Unit>("SELECT id, name FROM unit WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(unit)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Unit>> {
        let unit = sqlx::query_as::<_, Unit>("SELECT id, name FROM unit WHERE name = ?1")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(unit)
    }

    /// Returns the unit with this name, creating it if needed.
    pub async fn get_or_create(&self, name: &str) -> DbResult<Unit> {
        let name = name.trim();

        let inserted = sqlx::query("INSERT INTO unit (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if inserted.rows_affected() > 0 {
            debug!(name = %name, "Created unit");
        }

        self.get_by_name(name)
            .await?
            .ok_or_else(|| DbError::not_found("Unit", name))
    }

    pub async fn list(&self) -> DbResult<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>("SELECT id, name FROM unit ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_get_or_create_is_case_insensitive() {
        let db = fixtures::db().await;
        let units = db.units();

        let strip = units.get_or_create("Strip").await.unwrap();
        let again = units.get_or_create(" strip ").await.unwrap();

        assert_eq!(strip.id, again.id);
        assert_eq!(units.list().await.unwrap().len(), 1);
        assert_eq!(units.get_by_id(strip.id).await.unwrap().unwrap().name, "Strip");
    }
}
