//! # Invoice Repository
//!
//! Sales invoice headers and lines. Same lifecycle as productions:
//! live headers only on read, soft delete, snapshot restore for undo.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::DocumentFilter;
use crate::error::{DbError, DbResult};
use pharmacon_core::{Invoice, InvoiceDraft, InvoiceItem, InvoiceItemDraft, InvoiceRecord};

const INVOICE_COLUMNS: &str = "id, number, customer_id, subtotal, discount, tax, total_price, \
     paid_amount, change_amount, payment_method, description, invoice_date, updated_to_stock, \
     user_id, last_modified_by_user_id, pdf_url, created_at, last_modified, deleted_at, \
     deleted_by_user_id";

const ITEM_COLUMNS: &str = "id, invoice_id, medicine_id, qty, unit_id, price, discount, subtotal";

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn insert(&self, draft: &InvoiceDraft, actor: i64) -> DbResult<Invoice> {
        debug!(number = %draft.number, total = %draft.total_price, "Inserting invoice");

        let now = Utc::now();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoice (
                number, customer_id, subtotal, discount, tax, total_price,
                paid_amount, change_amount, payment_method, description, invoice_date,
                updated_to_stock, user_id, last_modified_by_user_id, created_at, last_modified
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13, ?14, ?14)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(&draft.number)
        .bind(draft.customer_id)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.tax)
        .bind(draft.total_price)
        .bind(draft.paid_amount)
        .bind(draft.change_amount)
        .bind(&draft.payment_method)
        .bind(&draft.description)
        .bind(draft.invoice_date)
        .bind(draft.updated_to_stock)
        .bind(actor)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("number", &draft.number))?;

        Ok(invoice)
    }

    pub async fn insert_items(&self, invoice_id: i64, items: &[InvoiceItemDraft]) -> DbResult<Vec<InvoiceItem>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(items.len());

        for item in items {
            let row = sqlx::query_as::<_, InvoiceItem>(&format!(
                r#"
                INSERT INTO invoice_item (invoice_id, medicine_id, qty, unit_id, price, discount, subtotal)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(invoice_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.price)
            .bind(item.discount)
            .bind(item.subtotal)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    pub async fn items(&self, invoice_id: i64) -> DbResult<Vec<InvoiceItem>> {
        let items = sqlx::query_as::<_, InvoiceItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM invoice_item WHERE invoice_id = ?1 ORDER BY id"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn get_record(&self, id: i64) -> DbResult<Option<InvoiceRecord>> {
        let Some(header) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(InvoiceRecord { header, items }))
    }

    pub async fn number_in_use(&self, number: &str, excluding: Option<i64>) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invoice
            WHERE number = ?1 AND deleted_at IS NULL AND (?2 IS NULL OR id != ?2)
            "#,
        )
        .bind(number)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Live invoices matching the filter, newest first.
    ///
    /// `party_name` matches the customer's name; `number` is a substring match.
    pub async fn list(&self, filter: &DocumentFilter) -> DbResult<Vec<Invoice>> {
        debug!(?filter, "Listing invoices");

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.*
            FROM invoice i
            JOIN customer c ON c.id = i.customer_id
            WHERE i.deleted_at IS NULL
              AND (?1 IS NULL OR i.invoice_date >= ?1)
              AND (?2 IS NULL OR i.invoice_date <= ?2)
              AND (?3 IS NULL OR i.number LIKE '%' || ?3 || '%')
              AND (?4 IS NULL OR i.user_id = ?4)
              AND (?5 IS NULL OR i.updated_to_stock = ?5)
              AND (?6 IS NULL OR c.name LIKE '%' || ?6 || '%')
            ORDER BY i.invoice_date DESC, i.id DESC
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
        Ok(invoices)
    }

    pub async fn update_header(&self, id: i64, draft: &InvoiceDraft, actor: i64) -> DbResult<Invoice> {
        debug!(invoice_id = id, "Updating invoice header");

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoice SET
                number = ?2,
                customer_id = ?3,
                subtotal = ?4,
                discount = ?5,
                tax = ?6,
                total_price = ?7,
                paid_amount = ?8,
                change_amount = ?9,
                payment_method = ?10,
                description = ?11,
                invoice_date = ?12,
                updated_to_stock = ?13,
                last_modified_by_user_id = ?14,
                last_modified = ?15
            WHERE id = ?1 AND deleted_at IS NULL
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.number)
        .bind(draft.customer_id)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.tax)
        .bind(draft.total_price)
        .bind(draft.paid_amount)
        .bind(draft.change_amount)
        .bind(&draft.payment_method)
        .bind(&draft.description)
        .bind(draft.invoice_date)
        .bind(draft.updated_to_stock)
        .bind(actor)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("number", &draft.number))?;

        invoice.ok_or_else(|| DbError::not_found("Invoice", id))
    }

    pub async fn replace_items(&self, invoice_id: i64, items: &[InvoiceItemDraft]) -> DbResult<Vec<InvoiceItem>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM invoice_item WHERE invoice_id = ?1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, InvoiceItem>(&format!(
                r#"
                INSERT INTO invoice_item (invoice_id, medicine_id, qty, unit_id, price, discount, subtotal)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(invoice_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.price)
            .bind(item.discount)
            .bind(item.subtotal)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn set_pdf_url(&self, id: i64, pdf_url: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE invoice SET pdf_url = ?2 WHERE id = ?1")
            .bind(id)
            .bind(pdf_url)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }
        Ok(())
    }

    pub async fn soft_delete(&self, id: i64, actor: i64) -> DbResult<()> {
        debug!(invoice_id = id, "Soft-deleting invoice");

        let result = sqlx::query(
            "UPDATE invoice SET deleted_at = ?2, deleted_by_user_id = ?3 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .bind(actor)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }
        Ok(())
    }

    pub async fn undelete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE invoice SET deleted_at = NULL, deleted_by_user_id = NULL WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }
        Ok(())
    }

    pub async fn hard_delete(&self, id: i64) -> DbResult<()> {
        debug!(invoice_id = id, "Hard-deleting invoice");

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM invoice_item WHERE invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM invoice WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }
        Ok(())
    }

    pub async fn restore(&self, record: &InvoiceRecord) -> DbResult<()> {
        let h = &record.header;
        debug!(invoice_id = h.id, "Restoring invoice snapshot");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invoice SET
                number = ?2,
                customer_id = ?3,
                subtotal = ?4,
                discount = ?5,
                tax = ?6,
                total_price = ?7,
                paid_amount = ?8,
                change_amount = ?9,
                payment_method = ?10,
                description = ?11,
                invoice_date = ?12,
                updated_to_stock = ?13,
                user_id = ?14,
                last_modified_by_user_id = ?15,
                pdf_url = ?16,
                created_at = ?17,
                last_modified = ?18,
                deleted_at = ?19,
                deleted_by_user_id = ?20
            WHERE id = ?1
            "#,
        )
        .bind(h.id)
        .bind(&h.number)
        .bind(h.customer_id)
        .bind(h.subtotal)
        .bind(h.discount)
        .bind(h.tax)
        .bind(h.total_price)
        .bind(h.paid_amount)
        .bind(h.change_amount)
        .bind(&h.payment_method)
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
            return Err(DbError::not_found("Invoice", h.id));
        }

        sqlx::query("DELETE FROM invoice_item WHERE invoice_id = ?1")
            .bind(h.id)
            .execute(&mut *tx)
            .await?;

        for item in &record.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_item (id, invoice_id, medicine_id, qty, unit_id, price, discount, subtotal)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(item.id)
            .bind(item.invoice_id)
            .bind(item.medicine_id)
            .bind(item.qty)
            .bind(item.unit_id)
            .bind(item.price)
            .bind(item.discount)
            .bind(item.subtotal)
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

    async fn draft(db: &crate::Database, number: &str) -> InvoiceDraft {
        let med = match db.medicines().get_by_barcode("PARA-500").await.unwrap() {
            Some(m) => m,
            None => fixtures::medicine(db, "PARA-500", 100.0).await,
        };
        let customer = match db.customers().get_by_name("Walk-in").await.unwrap() {
            Some(c) => c,
            None => db.customers().insert("Walk-in").await.unwrap(),
        };
        InvoiceDraft::new(
            number.to_string(),
            customer.id,
            Money::zero(),
            Money::zero(),
            Money::from_cents(10_000),
            "cash".to_string(),
            String::new(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            true,
            vec![InvoiceItemDraft::new(
                med.id,
                3.0,
                med.base_unit_id,
                Money::from_cents(2_000),
                Money::zero(),
            )
            .unwrap()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_with_items() {
        let db = fixtures::db().await;
        let repo = db.invoices();
        let d = draft(&db, "INV-001").await;

        let header = repo.insert(&d, 1).await.unwrap();
        repo.insert_items(header.id, &d.items).await.unwrap();

        let record = repo.get_record(header.id).await.unwrap().unwrap();
        assert_eq!(record.header.total_price, Money::from_cents(6_000));
        assert_eq!(record.header.change_amount, Money::from_cents(4_000));
        assert_eq!(record.items[0].subtotal, Money::from_cents(6_000));
        assert!(repo.number_in_use("INV-001", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_customer_and_number() {
        let db = fixtures::db().await;
        let repo = db.invoices();
        repo.insert(&draft(&db, "INV-001").await, 1).await.unwrap();
        repo.insert(&draft(&db, "INV-002").await, 1).await.unwrap();

        let by_customer = DocumentFilter {
            party_name: Some("walk".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_customer).await.unwrap().len(), 2);

        let by_number = DocumentFilter {
            number: Some("002".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_number).await.unwrap()[0].number, "INV-002");
    }

    #[tokio::test]
    async fn test_soft_delete_and_undelete() {
        let db = fixtures::db().await;
        let repo = db.invoices();
        let header = repo.insert(&draft(&db, "INV-001").await, 1).await.unwrap();

        repo.soft_delete(header.id, 1).await.unwrap();
        assert!(repo.get(header.id).await.unwrap().is_none());
        assert!(matches!(
            repo.soft_delete(header.id, 1).await,
            Err(DbError::NotFound { .. })
        ));

        repo.undelete(header.id).await.unwrap();
        assert!(repo.get(header.id).await.unwrap().is_some());
    }
}
