//! # Purchase Invoice Repository
//!
//! Supplier invoices and the batches they bring into stock.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::DocumentFilter;
use crate::error::{DbError, DbResult};
use pharmacon_core::{PurchaseInvoice, PurchaseInvoiceDraft, PurchaseInvoiceRecord, PurchaseItem, PurchaseItemDraft};

const PURCHASE_COLUMNS: &str = "id, number, supplier_id, subtotal, discount, tax, total_price, \
     description, invoice_date, updated_to_stock, user_id, last_modified_by_user_id, pdf_url, \
     created_at, last_modified, deleted_at, deleted_by_user_id";

const ITEM_COLUMNS: &str = "id, purchase_invoice_id, medicine_id, qty, unit_id, purchase_price, \
     discount, tax, subtotal, batch_number, expired_date";

#[derive(Debug, Clone)]
pub struct PurchaseInvoiceRepository {
    pool: SqlitePool,
}

impl PurchaseInvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseInvoiceRepository { pool }
    }

    pub async fn insert(&self, draft: &PurchaseInvoiceDraft, actor: i64) -> DbResult<PurchaseInvoice> {
        debug!(number = %draft.number, total = %draft.total_price, "Inserting purchase invoice");

        let now = Utc::now();
        let purchase = sqlx::query_as::<_, PurchaseInvoice>(&format!(
            r#"
            INSERT INTO purchase_invoice (
                number, supplier_id, subtotal, discount, tax, total_price,
                description, invoice_date, updated_to_stock,
                user_id, last_modified_by_user_id, created_at, last_modified
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?11, ?11)
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(&draft.number)
        .bind(draft.supplier_id)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.tax)
        .bind(draft.total_price)
        .bind(&draft.description)
        .bind(draft.invoice_date)
        .bind(draft.updated_to_stock)
        .bind(actor)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("number", &draft.number))?;

        Ok(purchase)
    }

    async fn write_items(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        purchase_id: i64,
        items: &[PurchaseItemDraft],
    ) -> DbResult<Vec<PurchaseItem>> {
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, PurchaseItem>(&format!(
                r#"
                INSERT INTO purchase_item (
                    purchase_invoice_id, medicine_id, qty, unit_id, purchase_price,
                    discount, tax, subtotal, batch_number, expired_date
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(purchase_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.purchase_price)
            .bind(item.discount)
            .bind(item.tax)
            .bind(item.subtotal)
            .bind(&item.batch_number)
            .bind(item.expired_date)
            .fetch_one(&mut **tx)
            .await?;
            inserted.push(row);
        }
        Ok(inserted)
    }

    pub async fn insert_items(&self, purchase_id: i64, items: &[PurchaseItemDraft]) -> DbResult<Vec<PurchaseItem>> {
        let mut tx = self.pool.begin().await?;
        let inserted = Self::write_items(&mut tx, purchase_id, items).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<PurchaseInvoice>> {
        let purchase = sqlx::query_as::<_, PurchaseInvoice>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase_invoice WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    pub async fn items(&self, purchase_id: i64) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_item WHERE purchase_invoice_id = ?1 ORDER BY id"
        ))
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn get_record(&self, id: i64) -> DbResult<Option<PurchaseInvoiceRecord>> {
        let Some(header) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(PurchaseInvoiceRecord { header, items }))
    }

    pub async fn number_in_use(&self, number: &str, excluding: Option<i64>) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM purchase_invoice
            WHERE number = ?1 AND deleted_at IS NULL AND (?2 IS NULL OR id != ?2)
            "#,
        )
        .bind(number)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// `party_name` matches the supplier's name.
    pub async fn list(&self, filter: &DocumentFilter) -> DbResult<Vec<PurchaseInvoice>> {
        debug!(?filter, "Listing purchase invoices");

        let purchases = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            SELECT pi.*
            FROM purchase_invoice pi
            JOIN supplier s ON s.id = pi.supplier_id
            WHERE pi.deleted_at IS NULL
              AND (?1 IS NULL OR pi.invoice_date >= ?1)
              AND (?2 IS NULL OR pi.invoice_date <= ?2)
              AND (?3 IS NULL OR pi.number LIKE '%' || ?3 || '%')
              AND (?4 IS NULL OR pi.user_id = ?4)
              AND (?5 IS NULL OR pi.updated_to_stock = ?5)
              AND (?6 IS NULL OR s.name LIKE '%' || ?6 || '%')
            ORDER BY pi.invoice_date DESC, pi.id DESC
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
        Ok(purchases)
    }

    pub async fn update_header(
        &self,
        id: i64,
        draft: &PurchaseInvoiceDraft,
        actor: i64,
    ) -> DbResult<PurchaseInvoice> {
        debug!(purchase_invoice_id = id, "Updating purchase invoice header");

        let purchase = sqlx::query_as::<_, PurchaseInvoice>(&format!(
            r#"
            UPDATE purchase_invoice SET
                number = ?2,
                supplier_id = ?3,
                subtotal = ?4,
                discount = ?5,
                tax = ?6,
                total_price = ?7,
                description = ?8,
                invoice_date = ?9,
                updated_to_stock = ?10,
                last_modified_by_user_id = ?11,
                last_modified = ?12
            WHERE id = ?1 AND deleted_at IS NULL
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.number)
        .bind(draft.supplier_id)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.tax)
        .bind(draft.total_price)
        .bind(&draft.description)
        .bind(draft.invoice_date)
        .bind(draft.updated_to_stock)
        .bind(actor)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("number", &draft.number))?;

        purchase.ok_or_else(|| DbError::not_found("Purchase invoice", id))
    }

    pub async fn replace_items(&self, purchase_id: i64, items: &[PurchaseItemDraft]) -> DbResult<Vec<PurchaseItem>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM purchase_item WHERE purchase_invoice_id = ?1")
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;
        let inserted = Self::write_items(&mut tx, purchase_id, items).await?;

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn set_pdf_url(&self, id: i64, pdf_url: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE purchase_invoice SET pdf_url = ?2 WHERE id = ?1")
            .bind(id)
            .bind(pdf_url)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase invoice", id));
        }
        Ok(())
    }

    pub async fn soft_delete(&self, id: i64, actor: i64) -> DbResult<()> {
        debug!(purchase_invoice_id = id, "Soft-deleting purchase invoice");

        let result = sqlx::query(
            "UPDATE purchase_invoice SET deleted_at = ?2, deleted_by_user_id = ?3 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .bind(actor)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase invoice", id));
        }
        Ok(())
    }

    pub async fn undelete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE purchase_invoice SET deleted_at = NULL, deleted_by_user_id = NULL WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase invoice", id));
        }
        Ok(())
    }

    pub async fn hard_delete(&self, id: i64) -> DbResult<()> {
        debug!(purchase_invoice_id = id, "Hard-deleting purchase invoice");

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM purchase_item WHERE purchase_invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM purchase_invoice WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase invoice", id));
        }
        Ok(())
    }

    pub async fn restore(&self, record: &PurchaseInvoiceRecord) -> DbResult<()> {
        let h = &record.header;
        debug!(purchase_invoice_id = h.id, "Restoring purchase invoice snapshot");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE purchase_invoice SET
                number = ?2,
                supplier_id = ?3,
                subtotal = ?4,
                discount = ?5,
                tax = ?6,
                total_price = ?7,
                description = ?8,
                invoice_date = ?9,
                updated_to_stock = ?10,
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
        .bind(&h.number)
        .bind(h.supplier_id)
        .bind(h.subtotal)
        .bind(h.discount)
        .bind(h.tax)
        .bind(h.total_price)
        .bind(&h.description)
        .bind(h.invoice_date)
        .bind(h.updated_to_stock)
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
            return Err(DbError::not_found("Purchase invoice", h.id));
        }

        sqlx::query("DELETE FROM purchase_item WHERE purchase_invoice_id = ?1")
            .bind(h.id)
            .execute(&mut *tx)
            .await?;

        for item in &record.items {
            sqlx::query(
                r#"
                INSERT INTO purchase_item (
                    id, purchase_invoice_id, medicine_id, qty, unit_id, purchase_price,
                    discount, tax, subtotal, batch_number, expired_date
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(item.id)
            .bind(item.purchase_invoice_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.purchase_price)
            .bind(item.discount)
            .bind(item.tax)
            .bind(item.subtotal)
            .bind(&item.batch_number)
            .bind(item.expired_date)
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
    use pharmacon_core::{Money, SupplierDraft};

    #[tokio::test]
    async fn test_purchase_roundtrip_and_restore() {
        let db = fixtures::db().await;
        let med = fixtures::medicine(&db, "AMOX-500", 0.0).await;
        let supplier = db
            .suppliers()
            .insert(
                &SupplierDraft {
                    name: "Enseval".to_string(),
                    address: String::new(),
                    company_phone_number: String::new(),
                    contact_person_name: String::new(),
                    contact_person_number: String::new(),
                    terms: String::new(),
                    vendor_is_taxable: false,
                },
                1,
            )
            .await
            .unwrap();

        let items = vec![PurchaseItemDraft::new(
            med.id,
            100.0,
            med.base_unit_id,
            Money::from_cents(500),
            Money::zero(),
            Money::from_cents(1_000),
            "B-2024-06".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 31),
        )
        .unwrap()];
        let draft = PurchaseInvoiceDraft::new(
            "PO-77".to_string(),
            supplier.id,
            Money::zero(),
            Money::zero(),
            String::new(),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            true,
            items,
        )
        .unwrap();

        let repo = db.purchase_invoices();
        let header = repo.insert(&draft, 1).await.unwrap();
        repo.insert_items(header.id, &draft.items).await.unwrap();

        let before = repo.get_record(header.id).await.unwrap().unwrap();
        assert_eq!(before.header.total_price, Money::from_cents(51_000));
        assert_eq!(before.items[0].expired_date, NaiveDate::from_ymd_opt(2026, 1, 31));

        repo.replace_items(header.id, &[]).await.unwrap();
        repo.set_pdf_url(header.id, Some("/tmp/po-77.pdf")).await.unwrap();
        repo.restore(&before).await.unwrap();

        assert_eq!(repo.get_record(header.id).await.unwrap().unwrap(), before);

        let filter = DocumentFilter {
            party_name: Some("ensev".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);
    }
}
