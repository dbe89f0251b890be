//! # Supplier Repository

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmacon_core::{Supplier, SupplierDraft};

const SUPPLIER_COLUMNS: &str = "id, name, address, company_phone_number, contact_person_name, \
     contact_person_number, terms, vendor_is_taxable, last_modified, last_modified_by_user_id";

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn insert(&self, draft: &SupplierDraft, actor: i64) -> DbResult<Supplier> {
        debug!(name = %draft.name, "Inserting supplier");

        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            INSERT INTO supplier (
                name, address, company_phone_number, contact_person_name,
                contact_person_number, terms, vendor_is_taxable,
                last_modified, last_modified_by_user_id
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.company_phone_number)
        .bind(&draft.contact_person_name)
        .bind(&draft.contact_person_number)
        .bind(&draft.terms)
        .bind(draft.vendor_is_taxable)
        .bind(Utc::now())
        .bind(actor)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("name", &draft.name))?;
        Ok(supplier)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE name = ?1"
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    /// Matches the supplier name or its contact person.
    pub async fn search(&self, query: Option<&str>) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            SELECT {SUPPLIER_COLUMNS} FROM supplier
            WHERE ?1 IS NULL
               OR name LIKE '%' || ?1 || '%'
               OR contact_person_name LIKE '%' || ?1 || '%'
            ORDER BY name
            "#
        ))
        .bind(query.map(str::trim))
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn update(&self, id: i64, draft: &SupplierDraft, actor: i64) -> DbResult<Supplier> {
        debug!(supplier_id = id, "Updating supplier");

        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            UPDATE supplier SET
                name = ?2,
                address = ?3,
                company_phone_number = ?4,
                contact_person_name = ?5,
                contact_person_number = ?6,
                terms = ?7,
                vendor_is_taxable = ?8,
                last_modified = ?9,
                last_modified_by_user_id = ?10
            WHERE id = ?1
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.company_phone_number)
        .bind(&draft.contact_person_name)
        .bind(&draft.contact_person_number)
        .bind(&draft.terms)
        .bind(draft.vendor_is_taxable)
        .bind(Utc::now())
        .bind(actor)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("name", &draft.name))?;

        supplier.ok_or_else(|| DbError::not_found("Supplier", id))
    }

    /// Fails with `ForeignKeyViolation` while purchase invoices reference it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM supplier WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::fixtures;
    use pharmacon_core::SupplierDraft;

    fn draft(name: &str, contact: &str) -> SupplierDraft {
        SupplierDraft {
            name: name.to_string(),
            address: "Jl. Merdeka 1".to_string(),
            company_phone_number: String::new(),
            contact_person_name: contact.to_string(),
            contact_person_number: String::new(),
            terms: "NET 30".to_string(),
            vendor_is_taxable: true,
        }
    }

    #[tokio::test]
    async fn test_supplier_search_and_update() {
        let db = fixtures::db().await;
        let suppliers = db.suppliers();

        let kimia = suppliers.insert(&draft("Kimia Farma", "Sari"), 1).await.unwrap();
        suppliers.insert(&draft("Enseval", "Joko"), 1).await.unwrap();

        assert_eq!(suppliers.search(Some("sari")).await.unwrap().len(), 1);
        assert_eq!(suppliers.search(None).await.unwrap().len(), 2);

        let mut changed = draft("Kimia Farma", "Dewi");
        changed.vendor_is_taxable = false;
        let updated = suppliers.update(kimia.id, &changed, 2).await.unwrap();
        assert_eq!(updated.contact_person_name, "Dewi");
        assert!(!updated.vendor_is_taxable);
        assert_eq!(updated.last_modified_by_user_id, 2);

        suppliers.delete(kimia.id).await.unwrap();
        assert!(suppliers.get_by_name("Kimia Farma").await.unwrap().is_none());
    }
}
