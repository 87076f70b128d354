//! # cava-db: Database Layer for Cava POS
//!
//! Persistence, configuration and change notifications for one register.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cava POS Data Flow                               │
//! │                                                                         │
//! │  SalesSession (cava-core) ──finalize──► Ticket                          │
//! │       ▲                                    │                            │
//! │       │ Catalog snapshot                   │ submit                     │
//! │  ┌────┴────────────────────────────────────▼────────────────────────┐   │
//! │  │                     cava-db (THIS CRATE)                         │   │
//! │  │                                                                  │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌────────────────┐    │   │
//! │  │   │   Database    │   │  Repositories  │   │  RealtimeHub   │    │   │
//! │  │   │   (pool.rs)   │◄──│ catalog, price │──►│ (org, table)   │    │   │
//! │  │   │  SqlitePool   │   │ inventory, ... │   │ subscriptions  │    │   │
//! │  │   └───────────────┘   └────────────────┘   └────────────────┘    │   │
//! │  │   AppConfig (TOML + CAVA_* env)     Migrations (embedded)        │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (platform data dir, or CAVA_DATABASE_PATH)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`config`] - Register configuration
//! - [`realtime`] - Change channels per (organization, table)
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cava_db::{AppConfig, Database, DbConfig};
//!
//! let config = AppConfig::load(None)?;
//! let db = Database::new(DbConfig::from_app_config(&config)).await?;
//!
//! let mut session = db.start_session(&config).await?;
//! // ... selection, cart, payment ...
//! let ticket = session.finalize()?;
//! db.orders().submit(&ticket).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod realtime;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, TicketNumbering};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use realtime::{ChangeEvent, ChangeHandler, RealtimeHub, Subscription};

// Repository re-exports for convenience
pub use repository::catalog::{CatalogRepository, EmissionRecord};
pub use repository::inventory::{InventoryRecord, InventoryRepository};
pub use repository::license::LicenseRepository;
pub use repository::order::OrderRepository;
pub use repository::price::{PriceRecord, PriceRepository};
pub use repository::product::{ProductRecord, ProductRepository};
pub use repository::settings::SettingsRepository;
