//! # Customer Repository

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmacon_core::Customer;

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, name: &str) -> DbResult<Customer> {
        debug!(name = %name, "Inserting customer");

        let customer = sqlx::query_as::<_, Customer>(
            "INSERT INTO customer (name, created_at) VALUES (?1, ?2) RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("name", name))?;
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT id, name, created_at FROM customer WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT id, name, created_at FROM customer WHERE name = ?1")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Customers whose name contains `name`; all of them when `None`.
    pub async fn search(&self, name: Option<&str>) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, created_at FROM customer
            WHERE ?1 IS NULL OR name LIKE '%' || ?1 || '%'
            ORDER BY name
            "#,
        )
        .bind(name.map(str::trim))
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    pub async fn rename(&self, id: i64, name: &str) -> DbResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>(
            "UPDATE customer SET name = ?2 WHERE id = ?1 RETURNING id, name, created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("name", name))?;

        customer.ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Fails with `ForeignKeyViolation` while invoices reference the customer.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(customer_id = id, "Deleting customer");

        let result = sqlx::query("DELETE FROM customer WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }
}
