//! # Medicine Repository
//!
//! Medicines, their unit conversions, and the one statement that is
//! allowed to change on-hand stock.
//!
//! ## Guarded Stock Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    apply_delta(id, delta, actor)                        │
//! │                                                                         │
//! │  UPDATE medicine SET qty = qty + delta                                 │
//! │   WHERE id = ? AND qty + delta >= 0                                    │
//! │  RETURNING qty                                                         │
//! │       │                                                                 │
//! │       ├── row returned ──► StockUpdate::Applied { qty }                │
//! │       │                                                                 │
//! │       └── no row ──► re-read qty                                       │
//! │                        ├── medicine missing ──► DbError::NotFound      │
//! │                        └── present ──► StockUpdate::Rejected           │
//! │                                        { available } (nothing changed) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, so two concurrent sales of
//! the last box cannot both succeed.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmacon_core::{Medicine, UnitConversion};

const MEDICINE_COLUMNS: &str = "id, barcode, name, qty, base_unit_id, created_at, last_modified, last_modified_by_user_id";

/// Outcome of a guarded stock update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StockUpdate {
    /// The delta was applied; `qty` is the new on-hand quantity.
    Applied { qty: f64 },
    /// The delta would have driven stock negative. Nothing was written.
    Rejected { available: f64 },
}

#[derive(Debug, Clone)]
pub struct MedicineRepository {
    pool: SqlitePool,
}

impl MedicineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MedicineRepository { pool }
    }

    /// Inserts a medicine with its opening stock (in the base unit).
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - barcode already used
    /// * `DbError::ForeignKeyViolation` - unknown base unit
    pub async fn insert(
        &self,
        barcode: &str,
        name: &str,
        qty: f64,
        base_unit_id: i64,
        actor: Option<i64>,
    ) -> DbResult<Medicine> {
        debug!(barcode = %barcode, qty, "Inserting medicine");

        let now = Utc::now();
        let medicine = sqlx::query_as::<_, Medicine>(&format!(
            r#"
            INSERT INTO medicine
                (barcode, name, qty, base_unit_id, created_at, last_modified, last_modified_by_user_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)
            RETURNING {MEDICINE_COLUMNS}
            "#
        ))
        .bind(barcode)
        .bind(name)
        .bind(qty)
        .bind(base_unit_id)
        .bind(now)
        .bind(actor)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("barcode", barcode))?;

        Ok(medicine)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Medicine>> {
        let medicine = sqlx::query_as::<_, Medicine>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicine WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(medicine)
    }

    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Medicine>> {
        let medicine = sqlx::query_as::<_, Medicine>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicine WHERE barcode = ?1"
        ))
        .bind(barcode.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(medicine)
    }

    /// Searches by name substring or barcode prefix. An empty query lists
    /// medicines by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Medicine>> {
        let query = query.trim();
        debug!(query = %query, limit, "Searching medicines");

        let medicines = sqlx::query_as::<_, Medicine>(&format!(
            r#"
            SELECT {MEDICINE_COLUMNS}
            FROM medicine
            WHERE ?1 = '' OR name LIKE '%' || ?1 || '%' OR barcode LIKE ?1 || '%'
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = medicines.len(), "Search returned medicines");
        Ok(medicines)
    }

    /// Current on-hand quantity, or `None` for an unknown medicine.
    pub async fn quantity(&self, id: i64) -> DbResult<Option<f64>> {
        let qty: Option<f64> = sqlx::query_scalar("SELECT qty FROM medicine WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(qty)
    }

    /// Sets how many base units one `unit_id` of this medicine holds.
    pub async fn set_conversion(&self, medicine_id: i64, unit_id: i64, factor: f64) -> DbResult<UnitConversion> {
        debug!(medicine_id, unit_id, factor, "Setting unit conversion");

        let conversion = sqlx::query_as::<_, UnitConversion>(
            r#"
            INSERT INTO medicine_unit_conversion (medicine_id, unit_id, factor)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(medicine_id, unit_id) DO UPDATE SET factor = excluded.factor
            RETURNING medicine_id, unit_id, factor
            "#,
        )
        .bind(medicine_id)
        .bind(unit_id)
        .bind(factor)
        .fetch_one(&self.pool)
        .await?;
        Ok(conversion)
    }

    pub async fn conversions(&self, medicine_id: i64) -> DbResult<Vec<UnitConversion>> {
        let conversions = sqlx::query_as::<_, UnitConversion>(
            "SELECT medicine_id, unit_id, factor FROM medicine_unit_conversion WHERE medicine_id = ?1 ORDER BY unit_id",
        )
        .bind(medicine_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversions)
    }

    /// Adds `delta` base units to the stock of `id`, refusing to go negative.
    ///
    /// ## Returns
    /// * `Ok(StockUpdate::Applied { qty })` - written, new quantity
    /// * `Ok(StockUpdate::Rejected { available })` - not written
    /// * `Err(DbError::NotFound)` - no such medicine
    pub async fn apply_delta(&self, id: i64, delta: f64, actor: i64) -> DbResult<StockUpdate> {
        debug!(medicine_id = id, delta, "Applying stock delta");

        let updated: Option<f64> = sqlx::query_scalar(
            r#"
            UPDATE medicine SET
                qty = qty + ?2,
                last_modified = ?3,
                last_modified_by_user_id = ?4
            WHERE id = ?1 AND qty + ?2 >= 0
            RETURNING qty
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(qty) = updated {
            return Ok(StockUpdate::Applied { qty });
        }

        match self.quantity(id).await? {
            Some(available) => Ok(StockUpdate::Rejected { available }),
            None => Err(DbError::not_found("Medicine", id)),
        }
    }
}
