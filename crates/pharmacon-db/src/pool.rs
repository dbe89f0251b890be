//! # Connection Pool
//!
//! One [`Database`] per process, cloned into every handler. Repositories
//! are thin views over the shared [`SqlitePool`] and are created per call.
//!
//! ```text
//! DbConfig::new("pharmacon.db")          DbConfig::in_memory()
//!        │  WAL, foreign keys on,               │  one connection, so the
//!        │  busy timeout for writers            │  schema lives as long as
//!        ▼                                      ▼  the pool
//!   Database::new ──► migrations ──► db.medicines() / db.invoices() / ...
//! ```
//!
//! Stock changes are single guarded statements, so two counters selling the
//! same medicine only ever contend on SQLite's write lock. The busy timeout
//! makes the loser wait instead of failing with `SQLITE_BUSY`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::company::CompanyProfileRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::medicine::MedicineRepository;
use crate::repository::production::ProductionRepository;
use crate::repository::purchase::PurchaseInvoiceRepository;
use crate::repository::supplier::SupplierRepository;
use crate::repository::token::TokenRepository;
use crate::repository::unit::UnitRepository;
use crate::repository::user::UserRepository;

const MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the database lives and how the pool behaves.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    pub max_connections: u32,

    /// How long a writer waits for the lock held by another writer.
    pub busy_timeout: Duration,

    /// Apply embedded migrations on connect.
    pub run_migrations: bool,
}

impl DbConfig {
    /// A file-backed database, created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A private, migrated database that disappears with the pool.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            ..DbConfig::new(MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY
    }

    /// An in-memory schema is lost when its last connection closes, so
    /// that connection is never retired for idleness or age.
    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(1);
        if self.is_memory() {
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(Duration::from_secs(600))
        }
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = if self.is_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", self.database_path.display())
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
            .create_if_missing(true);

        // WAL needs a file; an in-memory database keeps its default journal
        if self.is_memory() {
            Ok(options)
        } else {
            Ok(options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal))
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -------------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------------

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn tokens(&self) -> TokenRepository {
        TokenRepository::new(self.pool.clone())
    }

    pub fn units(&self) -> UnitRepository {
        UnitRepository::new(self.pool.clone())
    }

    pub fn medicines(&self) -> MedicineRepository {
        MedicineRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.pool.clone())
    }

    pub fn company_profile(&self) -> CompanyProfileRepository {
        CompanyProfileRepository::new(self.pool.clone())
    }

    pub fn productions(&self) -> ProductionRepository {
        ProductionRepository::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    pub fn purchase_invoices(&self) -> PurchaseInvoiceRepository {
        PurchaseInvoiceRepository::new(self.pool.clone())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// True when a trivial query succeeds. Backs `GET /health`.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert_eq!(db.users().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pharmacon.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.units().get_or_create("tablet").await.unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(&path).run_migrations(false)).await.unwrap();
        assert!(db.units().get_by_name("tablet").await.unwrap().is_some());
    }

    #[test]
    fn test_in_memory_uses_one_connection() {
        let config = DbConfig::in_memory().max_connections(4);
        assert!(config.is_memory());
        assert_eq!(config.max_connections, 4);
        assert_eq!(DbConfig::in_memory().max_connections, 1);
    }

    #[test]
    fn test_in_memory_connection_is_never_retired() {
        let options = DbConfig::in_memory().pool_options();
        assert_eq!(options.get_max_lifetime(), None);
        assert_eq!(options.get_idle_timeout(), None);

        let options = DbConfig::new("pharmacon.db").pool_options();
        assert!(options.get_max_lifetime().is_some());
        assert!(options.get_idle_timeout().is_some());
    }
}
