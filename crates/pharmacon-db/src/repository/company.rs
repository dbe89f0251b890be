//! # Company Profile Repository
//!
//! The pharmacy's own details. The table holds at most one row (`id = 1`).

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;
use pharmacon_core::{CompanyProfile, CompanyProfileDraft};

const PROFILE_COLUMNS: &str = "id, name, address, business_number, pharmacist, \
     pharmacist_license_number, last_modified, last_modified_by_user_id";

#[derive(Debug, Clone)]
pub struct CompanyProfileRepository {
    pool: SqlitePool,
}

impl CompanyProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CompanyProfileRepository { pool }
    }

    /// The profile, or `None` before anyone has saved one.
    pub async fn get(&self) -> DbResult<Option<CompanyProfile>> {
        let profile = sqlx::query_as::<_, CompanyProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM company_profile WHERE id = 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    /// Creates or replaces the profile.
    pub async fn upsert(&self, draft: &CompanyProfileDraft, actor: i64) -> DbResult<CompanyProfile> {
        let profile = sqlx::query_as::<_, CompanyProfile>(&format!(
            r#"
            INSERT INTO company_profile (
                id, name, address, business_number, pharmacist,
                pharmacist_license_number, last_modified, last_modified_by_user_id
            )
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                business_number = excluded.business_number,
                pharmacist = excluded.pharmacist,
                pharmacist_license_number = excluded.pharmacist_license_number,
                last_modified = excluded.last_modified,
                last_modified_by_user_id = excluded.last_modified_by_user_id
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.business_number)
        .bind(&draft.pharmacist)
        .bind(&draft.pharmacist_license_number)
        .bind(Utc::now())
        .bind(actor)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::fixtures;
    use pharmacon_core::CompanyProfileDraft;

    #[tokio::test]
    async fn test_upsert_keeps_single_row() {
        let db = fixtures::db().await;
        let repo = db.company_profile();
        assert!(repo.get().await.unwrap().is_none());

        let mut draft = CompanyProfileDraft {
            name: "Apotek Sehat".to_string(),
            address: String::new(),
            business_number: "SIA-01".to_string(),
            pharmacist: "apt. Rina".to_string(),
            pharmacist_license_number: "SIPA-7".to_string(),
        };
        repo.upsert(&draft, 1).await.unwrap();

        draft.name = "Apotek Sehat Selalu".to_string();
        let saved = repo.upsert(&draft, 2).await.unwrap();

        assert_eq!(saved.id, 1);
        assert_eq!(saved.name, "Apotek Sehat Selalu");
        assert_eq!(repo.get().await.unwrap().unwrap().last_modified_by_user_id, 2);
    }
}
