//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      CoreError (stock, license key)         │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  DbError (this module) ← Adds context and categorization                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::user_message() ← What the cashier reads                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cava_core::CoreError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - Unknown license key
    /// - Order id doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Price or inventory row for a product that was never created
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// License is bound to another device.
    #[error("License {key} is already activated on another device")]
    AlreadyActivated { key: String },

    /// License was revoked by the vendor.
    #[error("License {key} has been revoked")]
    LicenseRevoked { key: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Stored JSON could not be read or written.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file or values are invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Message suitable for the cashier.
    ///
    /// Business rejections keep their own wording; infrastructure failures
    /// collapse into a generic retry message.
    pub fn user_message(&self) -> String {
        match self {
            DbError::Core(err) => err.to_string(),
            DbError::NotFound { entity, .. } if entity == "License" => {
                "License key not found".to_string()
            }
            DbError::NotFound { entity, .. } => format!("{} not found", entity),
            DbError::AlreadyActivated { .. } => {
                "This license is already in use on another device".to_string()
            }
            DbError::LicenseRevoked { .. } => "This license has been revoked".to_string(),
            DbError::UniqueViolation { .. } => "That record already exists".to_string(),
            DbError::Config(msg) => format!("Configuration error: {}", msg),
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                "Could not reach the database. Please try again.".to_string()
            }
            _ => "Something went wrong while saving. Please try again.".to_string(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_keep_their_message() {
        let err: DbError = CoreError::InsufficientStock {
            product: "Solera".to_string(),
            available: 4,
            requested: 12,
        }
        .into();
        assert_eq!(
            err.user_message(),
            "Insufficient stock for Solera: available 4, requested 12"
        );
    }

    #[test]
    fn test_license_messages() {
        assert_eq!(
            DbError::not_found("License", "ABCD").user_message(),
            "License key not found"
        );
        assert!(DbError::AlreadyActivated {
            key: "ABCD".to_string()
        }
        .user_message()
        .contains("another device"));
    }

    #[test]
    fn test_infrastructure_errors_are_generic() {
        let msg = DbError::QueryFailed("near \"SELEC\": syntax error".to_string()).user_message();
        assert!(!msg.contains("SELEC"));
        assert_eq!(
            DbError::PoolExhausted.user_message(),
            "Could not reach the database. Please try again."
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let err: DbError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
        assert!(matches!(err, DbError::Config(_)));
    }
}
