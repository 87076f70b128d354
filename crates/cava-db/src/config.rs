//! # Application Configuration
//!
//! Store identity, database location and display settings for one register.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     CAVA_ORGANIZATION_ID=...                                            │
//! │     CAVA_DEVICE_ID=till-1                                               │
//! │     CAVA_DATABASE_PATH=/var/lib/cava/cava.db                            │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     $CAVA_CONFIG, otherwise                                             │
//! │     ~/.config/pos/cava.toml (Linux)                                     │
//! │     ~/Library/Application Support/com.cava.pos/cava.toml (macOS)        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     Default organization, generated device id, sequential tickets       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! organization_id = "00000000-0000-0000-0000-000000000001"
//! name = "Licorería La Esquina"
//!
//! [device]
//! id = "till-1"
//!
//! [database]
//! path = "cava.db"
//!
//! [currency]
//! primary_symbol = "$"
//! secondary_symbol = "Bs."
//!
//! [tickets]
//! numbers = "sequential"  # sequential | random
//! ```

use std::path::PathBuf;

use cava_core::formatters::CurrencyFormat;
use cava_core::ticket_flow::MAX_TICKET_NUMBER;
use cava_core::validation::validate_organization_id;
use cava_core::{RandomNumbers, SequentialNumbers, TicketNumberSource, DEFAULT_ORGANIZATION_ID};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CAVA_CONFIG";

// =============================================================================
// Ticket Numbers
// =============================================================================

/// How ticket numbers are drawn when a ticket enters payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketNumbering {
    /// 1, 2, 3 ... 9999, then back to 1.
    #[default]
    Sequential,

    /// Random four digits, collisions possible.
    Random,
}

impl TicketNumbering {
    /// Builds the number source for a new session.
    ///
    /// `last_number` is the highest number already stored, so a sequential
    /// register continues where it left off after a restart.
    pub fn source(&self, last_number: u16) -> Box<dyn TicketNumberSource> {
        match self {
            TicketNumbering::Sequential => {
                let next = if last_number >= MAX_TICKET_NUMBER {
                    1
                } else {
                    last_number + 1
                };
                Box::new(SequentialNumbers::starting_at(next))
            }
            TicketNumbering::Random => Box::new(RandomNumbers),
        }
    }
}

impl std::fmt::Display for TicketNumbering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketNumbering::Sequential => write!(f, "sequential"),
            TicketNumbering::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for TicketNumbering {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(TicketNumbering::Sequential),
            "random" => Ok(TicketNumbering::Random),
            other => Err(DbError::Config(format!(
                "Unknown ticket numbering: '{}'. Valid options: sequential, random",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// The store this register sells for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_organization_id")]
    pub organization_id: String,

    #[serde(default = "default_store_name")]
    pub name: String,
}

fn default_organization_id() -> String {
    DEFAULT_ORGANIZATION_ID.to_string()
}

fn default_store_name() -> String {
    "Cava".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            organization_id: default_organization_id(),
            name: default_store_name(),
        }
    }
}

/// This register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Identifier licenses are bound to.
    /// Generated on first run if not provided, then written back to the
    /// config file by [`AppConfig::load`].
    #[serde(default = "default_device_id")]
    pub id: String,
}

fn default_device_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            id: default_device_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "cava", "pos")
        .map(|dirs| dirs.data_dir().join("cava.db"))
        .unwrap_or_else(|| PathBuf::from("cava.db"))
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

/// Currency symbols for the two amounts every price carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "default_primary_symbol")]
    pub primary_symbol: String,

    #[serde(default = "default_secondary_symbol")]
    pub secondary_symbol: String,
}

fn default_primary_symbol() -> String {
    "$".to_string()
}

fn default_secondary_symbol() -> String {
    "Bs.".to_string()
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            primary_symbol: default_primary_symbol(),
            secondary_symbol: default_secondary_symbol(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketSettings {
    #[serde(default)]
    pub numbers: TicketNumbering,
}

/// Whether a TOML document sets `[device] id`.
fn declares_device_id(contents: &str) -> DbResult<bool> {
    let table: toml::Table = toml::from_str(contents)?;
    Ok(table
        .get("device")
        .and_then(|device| device.get("id"))
        .is_some())
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete register configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub currency: CurrencySettings,

    #[serde(default)]
    pub tickets: TicketSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, then `$CAVA_CONFIG`, then the platform dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            let has_device_id = if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
                declares_device_id(&contents)?
            } else {
                debug!(?path, "Config file not found, using defaults");
                false
            };

            // Licenses are bound to this id; it must not change between runs.
            if !has_device_id {
                info!(device_id = %config.device.id, ?path, "Persisting generated device id");
                config.save(Some(path))?;
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document; missing sections fall back to defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        validate_organization_id(&self.store.organization_id)
            .map_err(|e| DbError::Config(e.to_string()))?;

        if self.device.id.trim().is_empty() {
            return Err(DbError::Config("device id must not be empty".into()));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database path must not be empty".into()));
        }

        if self.currency.primary_symbol.trim().is_empty()
            || self.currency.secondary_symbol.trim().is_empty()
        {
            return Err(DbError::Config("currency symbols must not be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("CAVA_ORGANIZATION_ID") {
            debug!(organization_id = %id, "Overriding organization from environment");
            self.store.organization_id = id;
        }

        if let Ok(name) = std::env::var("CAVA_STORE_NAME") {
            self.store.name = name;
        }

        if let Ok(id) = std::env::var("CAVA_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(path) = std::env::var("CAVA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(symbol) = std::env::var("CAVA_PRIMARY_SYMBOL") {
            self.currency.primary_symbol = symbol;
        }

        if let Ok(symbol) = std::env::var("CAVA_SECONDARY_SYMBOL") {
            self.currency.secondary_symbol = symbol;
        }

        if let Ok(numbers) = std::env::var("CAVA_TICKET_NUMBERS") {
            match numbers.parse() {
                Ok(parsed) => self.tickets.numbers = parsed,
                Err(_) => warn!(numbers = %numbers, "Unknown ticket numbering in environment"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cava", "pos")
            .map(|dirs| dirs.config_dir().join("cava.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn organization_id(&self) -> &str {
        &self.store.organization_id
    }

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn primary_currency(&self) -> CurrencyFormat {
        CurrencyFormat::primary().with_symbol(self.currency.primary_symbol.as_str())
    }

    pub fn secondary_currency(&self) -> CurrencyFormat {
        CurrencyFormat::secondary().with_symbol(self.currency.secondary_symbol.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_numbering_parsing() {
        assert_eq!(
            "sequential".parse::<TicketNumbering>().unwrap(),
            TicketNumbering::Sequential
        );
        assert_eq!(" Random ".parse::<TicketNumbering>().unwrap(), TicketNumbering::Random);
        assert!("daily".parse::<TicketNumbering>().is_err());
    }

    #[test]
    fn test_sequential_source_continues_after_last() {
        let mut source = TicketNumbering::Sequential.source(41);
        assert_eq!(source.next_number(), 42);
        assert_eq!(source.next_number(), 43);

        let mut wrapped = TicketNumbering::Sequential.source(9999);
        assert_eq!(wrapped.next_number(), 1);
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.organization_id(), DEFAULT_ORGANIZATION_ID);
        assert!(!config.device_id().is_empty());
        assert_eq!(config.currency.primary_symbol, "$");
        assert_eq!(config.currency.secondary_symbol, "Bs.");
        assert_eq!(config.tickets.numbers, TicketNumbering::Sequential);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [store]
            name = "La Esquina"

            [tickets]
            numbers = "random"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.name, "La Esquina");
        assert_eq!(config.organization_id(), DEFAULT_ORGANIZATION_ID);
        assert_eq!(config.tickets.numbers, TicketNumbering::Random);
        assert_eq!(config.currency.secondary_symbol, "Bs.");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = AppConfig::from_toml("[tickets]\nnumbers = \"daily\"").unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.store.organization_id = "store-1".to_string();
        assert!(config.validate().is_err());

        config.store.organization_id = DEFAULT_ORGANIZATION_ID.to_string();
        config.device.id = "  ".to_string();
        assert!(config.validate().is_err());

        config.device.id = "till-1".to_string();
        config.currency.primary_symbol = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[tickets]"));

        let back = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(back.device_id(), config.device_id());
    }

    fn scratch_config(contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cava-config-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cava.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_generated_device_id_survives_reload() {
        let path = scratch_config("[store]\nname = \"La Esquina\"\n");

        let first = AppConfig::load(Some(path.clone())).unwrap();
        let second = AppConfig::load(Some(path.clone())).unwrap();
        assert_eq!(first.device_id(), second.device_id());
        assert_eq!(second.store.name, "La Esquina");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(declares_device_id(&written).unwrap());

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_configured_device_id_is_kept() {
        let path = scratch_config("[device]\nid = \"till-1\"\n");

        let config = AppConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.device_id(), "till-1");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[device]\nid = \"till-1\"\n"
        );

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_currency_formats_use_symbols() {
        let config = AppConfig::default();
        assert_eq!(
            config.secondary_currency().format(cava_core::Money::from_cents(116_000)),
            CurrencyFormat::secondary().format(cava_core::Money::from_cents(116_000))
        );
    }
}
