//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Register startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::from_app_config(&config) ← Path from AppConfig               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐   ┌──────────────────┐     │
//! │  │            SqlitePool                   │   │   RealtimeHub    │     │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐        │   │ (org, table) ──► │     │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...    │   │   subscribers    │     │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘        │   └────────▲─────────┘     │
//! │  └─────────────────────────────────────────┘            │               │
//! │       │                                                 │               │
//! │       ▼                                                 │               │
//! │  db.orders() / db.prices() / db.inventory() ── publish ─┘               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled:
//! - Readers don't block writers
//! - Writers don't block readers

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use cava_core::{Catalog, SalesSession};

use crate::config::AppConfig;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::realtime::RealtimeHub;
use crate::repository::catalog::CatalogRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::license::LicenseRepository;
use crate::repository::order::OrderRepository;
use crate::repository::price::PriceRepository;
use crate::repository::product::ProductRepository;
use crate::repository::settings::SettingsRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/cava.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5 (one register rarely needs more)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Database settings of a loaded [`AppConfig`].
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.database.path.clone())
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone: the pool and the realtime hub are shared handles.
/// Every repository handed out publishes on the same hub.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Change notifications for the repositories that write.
    hub: RealtimeHub,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
            }
        }

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite ships with them disabled
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            hub: RealtimeHub::new(),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// - Applies all pending migrations in order
    /// - Idempotent: safe to run multiple times
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// Prefer using repository methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The hub every repository publishes on.
    pub fn realtime(&self) -> &RealtimeHub {
        &self.hub
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Emissions and catalog snapshots.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn prices(&self) -> PriceRepository {
        PriceRepository::new(self.pool.clone(), self.hub.clone())
    }

    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone(), self.hub.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone(), self.hub.clone())
    }

    /// Returns the order repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let ticket = session.finalize()?;
    /// db.orders().submit(&ticket).await?;
    /// ```
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone(), self.hub.clone())
    }

    pub fn licenses(&self) -> LicenseRepository {
        LicenseRepository::new(self.pool.clone())
    }

    /// Starts a sale on a fresh catalog snapshot.
    ///
    /// Sequential ticket numbers continue after the last stored ticket.
    pub async fn start_session(&self, config: &AppConfig) -> DbResult<SalesSession<Catalog>> {
        let organization_id = config.organization_id();
        let catalog = self.catalog().load(organization_id).await?;
        let last = self.orders().last_ticket_number(organization_id).await?;

        debug!(
            organization_id,
            last_ticket = last,
            numbers = %config.tickets.numbers,
            "Starting sales session"
        );
        Ok(SalesSession::new(catalog, organization_id)
            .with_ticket_numbers(config.tickets.numbers.source(last)))
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cava_core::{ConsumptionMode, Money, PaymentMethod, PriceMode, Subtype};

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
    }

    #[tokio::test]
    async fn test_sessions_continue_ticket_numbers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let org = cava_core::DEFAULT_ORGANIZATION_ID;
        db.catalog().upsert_emission(org, "Case", Subtype::Can, 24).await.unwrap();
        db.products().upsert(org, "Polar Light").await.unwrap();
        db.prices()
            .upsert(
                org,
                "Polar Light",
                "Case",
                Subtype::Can,
                PriceMode::Standard,
                Money::from_cents(2200),
                Money::from_cents(88_000),
            )
            .await
            .unwrap();

        let config = AppConfig::default();
        let mut numbers = Vec::new();
        for _ in 0..2 {
            let mut session = db.start_session(&config).await.unwrap();
            session.select_consumption_mode(ConsumptionMode::Takeaway);
            session.change_subtype(Subtype::Can);
            session.select_emission("Case");
            session.select_beer_type("Polar Light");
            session.add_to_cart().unwrap().unwrap();
            session.advance().unwrap();
            session.advance().unwrap();
            session.set_payment_method(Some(PaymentMethod::Card));
            let ticket = session.finalize().unwrap();
            db.orders().submit(&ticket).await.unwrap();
            numbers.push(ticket.number);
        }

        assert_eq!(numbers, vec![1, 2]);
    }
}
