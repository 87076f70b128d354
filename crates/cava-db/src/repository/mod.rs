//! # Repository Module
//!
//! Database repository implementations for Cava POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  View layer / seed tool                                                 │
//! │       │                                                                 │
//! │       │  db.orders().submit(&ticket)                                    │
//! │       ▼                                                                 │
//! │  OrderRepository                                                        │
//! │  ├── submit(&self, ticket)      one transaction                         │
//! │  ├── mark_paid(&self, id, ...)                                          │
//! │  └── get / list / last_ticket_number                                    │
//! │       │                                                                 │
//! │       ├──► SQLite (SqlitePool)                                          │
//! │       └──► RealtimeHub::publish after commit                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products by name
//! - [`CatalogRepository`](catalog::CatalogRepository) - Emissions and catalog snapshots
//! - [`PriceRepository`](price::PriceRepository) - Prices, keyed by product/emission/subtype/locality
//! - [`InventoryRepository`](inventory::InventoryRepository) - Stock in units
//! - [`SettingsRepository`](settings::SettingsRepository) - Key/value settings
//! - [`OrderRepository`](order::OrderRepository) - Ticket persistence
//! - [`LicenseRepository`](license::LicenseRepository) - License activation

pub mod catalog;
pub mod inventory;
pub mod license;
pub mod order;
pub mod price;
pub mod product;
pub mod settings;
