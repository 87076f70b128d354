//! # Settings Repository
//!
//! Free-form key/value store per organization (exchange rate, receipt
//! footer, ...). Keys are unique per organization; writes are upserts.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::realtime::{ChangeEvent, RealtimeHub};
use cava_core::ChangeKind;

pub const SETTINGS_TABLE: &str = "settings";

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
    hub: RealtimeHub,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool, hub: RealtimeHub) -> Self {
        SettingsRepository { pool, hub }
    }

    pub async fn set(&self, organization_id: &str, key: &str, value: &str) -> DbResult<()> {
        debug!(organization_id, key, "Saving setting");

        sqlx::query(
            r#"
            INSERT INTO settings (organization_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (organization_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(organization_id)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.hub
            .publish(ChangeEvent::new(
                ChangeKind::Update,
                SETTINGS_TABLE,
                organization_id,
                key,
                serde_json::json!({ "key": key, "value": value }),
            ))
            .await;
        Ok(())
    }

    pub async fn get(&self, organization_id: &str, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM settings WHERE organization_id = ?1 AND key = ?2",
        )
        .bind(organization_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    /// All settings of an organization, sorted by key.
    pub async fn get_all(&self, organization_id: &str) -> DbResult<BTreeMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM settings WHERE organization_id = ?1")
                .bind(organization_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().collect())
    }

    /// Removes a setting. Returns whether it existed.
    pub async fn delete(&self, organization_id: &str, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE organization_id = ?1 AND key = ?2")
            .bind(organization_id)
            .bind(key)
            .execute(&self.pool)
            .await?;

        let existed = result.rows_affected() > 0;
        if existed {
            self.hub
                .publish(ChangeEvent::new(
                    ChangeKind::Delete,
                    SETTINGS_TABLE,
                    organization_id,
                    key,
                    serde_json::json!({ "key": key }),
                ))
                .await;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use cava_core::DEFAULT_ORGANIZATION_ID as ORG;

    #[tokio::test]
    async fn test_settings_are_scoped_by_organization() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        settings.set(ORG, "exchange_rate", "40.00").await.unwrap();
        settings.set(ORG, "exchange_rate", "41.50").await.unwrap();
        settings.set(ORG, "footer", "Gracias").await.unwrap();
        settings.set("other-org", "exchange_rate", "1").await.unwrap();

        assert_eq!(
            settings.get(ORG, "exchange_rate").await.unwrap().as_deref(),
            Some("41.50")
        );
        let all = settings.get_all(ORG).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["footer"], "Gracias");
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        settings.set(ORG, "footer", "Gracias").await.unwrap();
        assert!(settings.delete(ORG, "footer").await.unwrap());
        assert!(!settings.delete(ORG, "footer").await.unwrap());
        assert!(settings.get(ORG, "footer").await.unwrap().is_none());
    }
}
