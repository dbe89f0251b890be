//! # Production Repository
//!
//! Production headers and their ingredient lines.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Production Lifecycle                              │
//! │                                                                         │
//! │  insert()        ──► header row (live)       undo: hard_delete()       │
//! │  insert_items()  ──► ingredient rows                                   │
//! │  set_pdf_url()   ──► rendered file attached                            │
//! │                                                                         │
//! │  update_header() + replace_items()           undo: restore(snapshot)   │
//! │                                                                         │
//! │  soft_delete()   ──► deleted_at set          undo: undelete()          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads only ever see live (not soft-deleted) headers.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::DocumentFilter;
use crate::error::{DbError, DbResult};
use pharmacon_core::{Production, ProductionDraft, ProductionItem, ProductionItemDraft, ProductionRecord};

const PRODUCTION_COLUMNS: &str = "id, number, produced_medicine_id, produced_qty, \
     produced_unit_id, production_date, description, updated_to_stock, updated_to_account, \
     total_cost, user_id, last_modified_by_user_id, pdf_url, created_at, last_modified, \
     deleted_at, deleted_by_user_id";

const ITEM_COLUMNS: &str = "id, production_id, medicine_id, qty, unit_id, cost";

#[derive(Debug, Clone)]
pub struct ProductionRepository {
    pool: SqlitePool,
}

impl ProductionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductionRepository { pool }
    }

    /// Inserts the header of a new production.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - a live production already has this number
    pub async fn insert(&self, draft: &ProductionDraft, actor: i64) -> DbResult<Production> {
        debug!(number = draft.number, "Inserting production");

        let now = Utc::now();
        let production = sqlx::query_as::<_, Production>(&format!(
            r#"
            INSERT INTO production (
                number, produced_medicine_id, produced_qty, produced_unit_id,
                production_date, description, updated_to_stock, updated_to_account,
                total_cost, user_id, last_modified_by_user_id, created_at, last_modified
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?11, ?11)
            RETURNING {PRODUCTION_COLUMNS}
            "#
        ))
        .bind(draft.number)
        .bind(draft.produced_medicine_id)
        .bind(draft.produced_qty)
        .bind(draft.produced_unit_id)
        .bind(draft.production_date)
        .bind(&draft.description)
        .bind(draft.updated_to_stock)
        .bind(draft.updated_to_account)
        .bind(draft.total_cost)
        .bind(actor)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("number", draft.number))?;

        Ok(production)
    }

    /// Inserts ingredient lines in one transaction.
    pub async fn insert_items(
        &self,
        production_id: i64,
        items: &[ProductionItemDraft],
    ) -> DbResult<Vec<ProductionItem>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(items.len());

        for item in items {
            let row = sqlx::query_as::<_, ProductionItem>(&format!(
                r#"
                INSERT INTO production_item (production_id, medicine_id, qty, unit_id, cost)
                VALUES (?1, ?2, ?3, ?4, ?5)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(production_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.cost)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// A live production header.
    pub async fn get(&self, id: i64) -> DbResult<Option<Production>> {
        let production = sqlx::query_as::<_, Production>(&format!(
            "SELECT {PRODUCTION_COLUMNS} FROM production WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(production)
    }

    pub async fn items(&self, production_id: i64) -> DbResult<Vec<ProductionItem>> {
        let items = sqlx::query_as::<_, ProductionItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM production_item WHERE production_id = ?1 ORDER BY id"
        ))
        .bind(production_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// A live production with its items.
    pub async fn get_record(&self, id: i64) -> DbResult<Option<ProductionRecord>> {
        let Some(header) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(ProductionRecord { header, items }))
    }

    /// Whether a live production other than `excluding` uses `number`.
    pub async fn number_in_use(&self, number: i64, excluding: Option<i64>) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM production
            WHERE number = ?1 AND deleted_at IS NULL AND (?2 IS NULL OR id != ?2)
            "#,
        )
        .bind(number)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Live productions matching the filter, newest first.
    ///
    /// `party_name` matches the produced medicine's name.
    pub async fn list(&self, filter: &DocumentFilter) -> DbResult<Vec<Production>> {
        debug!(?filter, "Listing productions");

        let productions = sqlx::query_as::<_, Production>(
            r#"
            SELECT p.*
            FROM production p
            JOIN medicine m ON m.id = p.produced_medicine_id
            WHERE p.deleted_at IS NULL
              AND (?1 IS NULL OR p.production_date >= ?1)
              AND (?2 IS NULL OR p.production_date <= ?2)
              AND (?3 IS NULL OR CAST(p.number AS TEXT) = ?3)
              AND (?4 IS NULL OR p.user_id = ?4)
              AND (?5 IS NULL OR p.updated_to_stock = ?5)
              AND (?6 IS NULL OR m.name LIKE '%' || ?6 || '%')
            ORDER BY p.production_date DESC, p.id DESC
            "#,
        )
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.number.as_deref())
        .bind(filter.user_id)
        .bind(filter.updated_to_stock)
        .bind(filter.party_name.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(productions)
    }

    /// Overwrites the editable header fields of a live production.
    pub async fn update_header(&self, id: i64, draft: &ProductionDraft, actor: i64) -> DbResult<Production> {
        debug!(production_id = id, "Updating production header");

        let production = sqlx::query_as::<_, Production>(&format!(
            r#"
            UPDATE production SET
                number = ?2,
                produced_medicine_id = ?3,
                produced_qty = ?4,
                produced_unit_id = ?5,
                production_date = ?6,
                description = ?7,
                updated_to_stock = ?8,
                updated_to_account = ?9,
                total_cost = ?10,
                last_modified_by_user_id = ?11,
                last_modified = ?12
            WHERE id = ?1 AND deleted_at IS NULL
            RETURNING {PRODUCTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.number)
        .bind(draft.produced_medicine_id)
        .bind(draft.produced_qty)
        .bind(draft.produced_unit_id)
        .bind(draft.production_date)
        .bind(&draft.description)
        .bind(draft.updated_to_stock)
        .bind(draft.updated_to_account)
        .bind(draft.total_cost)
        .bind(actor)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("number", draft.number))?;

        production.ok_or_else(|| DbError::not_found("Production", id))
    }

    /// Deletes the current lines and inserts `items`, atomically.
    pub async fn replace_items(
        &self,
        production_id: i64,
        items: &[ProductionItemDraft],
    ) -> DbResult<Vec<ProductionItem>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM production_item WHERE production_id = ?1")
            .bind(production_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, ProductionItem>(&format!(
                r#"
                INSERT INTO production_item (production_id, medicine_id, qty, unit_id, cost)
                VALUES (?1, ?2, ?3, ?4, ?5)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(production_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.cost)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn set_pdf_url(&self, id: i64, pdf_url: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE production SET pdf_url = ?2 WHERE id = ?1")
            .bind(id)
            .bind(pdf_url)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Production", id));
        }
        Ok(())
    }

    /// Marks a live production deleted.
    pub async fn soft_delete(&self, id: i64, actor: i64) -> DbResult<()> {
        debug!(production_id = id, "Soft-deleting production");

        let result = sqlx::query(
            r#"
            UPDATE production SET deleted_at = ?2, deleted_by_user_id = ?3
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .bind(actor)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Production", id));
        }
        Ok(())
    }

    /// Clears the deletion marks set by [`soft_delete`](Self::soft_delete).
    pub async fn undelete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE production SET deleted_at = NULL, deleted_by_user_id = NULL WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Production", id));
        }
        Ok(())
    }

    /// Removes the header and (by cascade) its items for good.
    pub async fn hard_delete(&self, id: i64) -> DbResult<()> {
        debug!(production_id = id, "Hard-deleting production");

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM production_item WHERE production_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM production WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Production", id));
        }
        Ok(())
    }

    /// Rewrites header and items exactly as captured in `record`.
    pub async fn restore(&self, record: &ProductionRecord) -> DbResult<()> {
        let h = &record.header;
        debug!(production_id = h.id, "Restoring production snapshot");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE production SET
                number = ?2,
                produced_medicine_id = ?3,
                produced_qty = ?4,
                produced_unit_id = ?5,
                production_date = ?6,
                description = ?7,
                updated_to_stock = ?8,
                updated_to_account = ?9,
                total_cost = ?10,
                user_id = ?11,
                last_modified_by_user_id = ?12,
                pdf_url = ?13,
                created_at = ?14,
                last_modified = ?15,
                deleted_at = ?16,
                deleted_by_user_id = ?17
            WHERE id = ?1
            "#,
        )
        .bind(h.id)
        .bind(h.number)
        .bind(h.produced_medicine_id)
        .bind(h.produced_qty)
        .bind(h.produced_unit_id)
        .bind(h.production_date)
        .bind(&h.description)
        .bind(h.updated_to_stock)
        .bind(h.updated_to_account)
        .bind(h.total_cost)
        .bind(h.user_id)
        .bind(h.last_modified_by_user_id)
        .bind(h.pdf_url.as_deref())
        .bind(h.created_at)
        .bind(h.last_modified)
        .bind(h.deleted_at)
        .bind(h.deleted_by_user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Production", h.id));
        }

        sqlx::query("DELETE FROM production_item WHERE production_id = ?1")
            .bind(h.id)
            .execute(&mut *tx)
            .await?;

        for item in &record.items {
            sqlx::query(
                r#"
                INSERT INTO production_item (id, production_id, medicine_id, qty, unit_id, cost)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(item.id)
            .bind(item.production_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.cost)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use chrono::NaiveDate;
    use pharmacon_core::Money;

    fn draft(number: i64, medicine_id: i64, unit_id: i64) -> ProductionDraft {
        ProductionDraft {
            number,
            produced_medicine_id: medicine_id,
            produced_qty: 20.0,
            produced_unit_id: unit_id,
            production_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            description: "Puyer batuk".to_string(),
            updated_to_stock: true,
            updated_to_account: false,
            total_cost: Money::from_cents(15_000),
            items: vec![ProductionItemDraft {
                medicine_id,
                qty: 2.0,
                unit_id,
                cost: Money::from_cents(7_500),
            }],
        }
    }

    #[tokio::test]
    async fn test_insert_get_and_number_uniqueness() {
        let db = fixtures::db().await;
        let med = fixtures::medicine(&db, "PUY-1", 0.0).await;
        let repo = db.productions();

        let d = draft(1, med.id, med.base_unit_id);
        let header = repo.insert(&d, 1).await.unwrap();
        repo.insert_items(header.id, &d.items).await.unwrap();

        let record = repo.get_record(header.id).await.unwrap().unwrap();
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.header.total_cost, Money::from_cents(15_000));
        assert!(repo.number_in_use(1, None).await.unwrap());
        assert!(!repo.number_in_use(1, Some(header.id)).await.unwrap());

        let err = repo.insert(&d, 1).await.unwrap_err();
        assert_eq!(err.to_string(), "Duplicate number: '1' already exists");
    }

    #[tokio::test]
    async fn test_soft_delete_frees_number() {
        let db = fixtures::db().await;
        let med = fixtures::medicine(&db, "PUY-1", 0.0).await;
        let repo = db.productions();
        let d = draft(7, med.id, med.base_unit_id);

        let first = repo.insert(&d, 1).await.unwrap();
        repo.soft_delete(first.id, 1).await.unwrap();

        assert!(repo.get(first.id).await.unwrap().is_none());
        assert!(repo.insert(&d, 1).await.is_ok());

        // The live copy now owns the number, so the old one can't come back.
        assert!(matches!(
            repo.undelete(first.id).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_restore_puts_snapshot_back() {
        let db = fixtures::db().await;
        let med = fixtures::medicine(&db, "PUY-1", 0.0).await;
        let repo = db.productions();
        let d = draft(3, med.id, med.base_unit_id);

        let header = repo.insert(&d, 1).await.unwrap();
        repo.insert_items(header.id, &d.items).await.unwrap();
        let before = repo.get_record(header.id).await.unwrap().unwrap();

        let mut changed = d.clone();
        changed.description = "changed".to_string();
        changed.items.push(changed.items[0].clone());
        repo.update_header(header.id, &changed, 2).await.unwrap();
        repo.replace_items(header.id, &changed.items).await.unwrap();

        repo.restore(&before).await.unwrap();
        assert_eq!(repo.get_record(header.id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = fixtures::db().await;
        let med = fixtures::medicine(&db, "PUY-1", 0.0).await;
        let repo = db.productions();

        let mut d = draft(1, med.id, med.base_unit_id);
        repo.insert(&d, 1).await.unwrap();
        d.number = 2;
        d.updated_to_stock = false;
        d.production_date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        repo.insert(&d, 2).await.unwrap();

        let all = repo.list(&DocumentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].number, 2);

        let july = DocumentFilter {
            start: NaiveDate::from_ymd_opt(2024, 7, 1),
            ..Default::default()
        };
        assert_eq!(repo.list(&july).await.unwrap().len(), 1);

        let applied = DocumentFilter {
            updated_to_stock: Some(true),
            party_name: Some("medicine puy".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&applied).await.unwrap()[0].number, 1);

        let by_user = DocumentFilter {
            user_id: Some(2),
            number: Some("2".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hard_delete_removes_items() {
        let db = fixtures::db().await;
        let med = fixtures::medicine(&db, "PUY-1", 0.0).await;
        let repo = db.productions();
        let d = draft(1, med.id, med.base_unit_id);

        let header = repo.insert(&d, 1).await.unwrap();
        repo.insert_items(header.id, &d.items).await.unwrap();
        repo.hard_delete(header.id).await.unwrap();

        assert!(repo.items(header.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.hard_delete(header.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
