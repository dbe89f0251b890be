//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite` are compiled into the binary and
//! applied in filename order when the pool opens.
//!
//! ```text
//! 001_initial_schema.sql    users, sessions, units, medicines, conversions,
//!                           customers, suppliers, company profile
//! 002_stock_documents.sql   productions, invoices, purchase invoices and
//!                           their line items
//! ```
//!
//! Applied files are checksummed by sqlx. Change the schema with a new
//! numbered file; editing an applied one makes startup fail.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (total, before) = migration_status(pool).await?;
    debug!(total, applied = before, "Schema version");

    MIGRATOR.run(pool).await?;

    if before < total {
        info!(applied = total - before, "Schema upgraded");
    }
    Ok(())
}

/// `(embedded, applied)` migration counts. Before the first run the
/// bookkeeping table does not exist and nothing counts as applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((MIGRATOR.iter().count(), applied.max(0) as usize))
}
