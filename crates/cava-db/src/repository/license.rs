//! # License Repository
//!
//! License keys issued to an organization and the device each is bound to.
//!
//! ## Activation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  activate(org, key, device)            one transaction                  │
//! │                                                                         │
//! │  no row for (org, key) ─────────────► NotFound                          │
//! │  status = revoked ──────────────────► LicenseRevoked                    │
//! │  active, other device ──────────────► AlreadyActivated                  │
//! │  active, same device ───────────────► Ok (unchanged)                    │
//! │  available ─────────────────────────► Ok, active + bound + timestamp    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use cava_core::{License, LicenseKey, LicenseStatus};

#[derive(Debug, Clone)]
pub struct LicenseRepository {
    pool: SqlitePool,
}

impl LicenseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LicenseRepository { pool }
    }

    /// Registers a new, unbound key for an organization.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Key already issued
    pub async fn issue(&self, organization_id: &str, key: &LicenseKey) -> DbResult<License> {
        info!(organization_id, key = %key.masked(), "Issuing license");

        sqlx::query(
            r#"
            INSERT INTO licenses (key, organization_id, status, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(key.as_str())
        .bind(organization_id)
        .bind(LicenseStatus::Available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("license", key.masked()),
            other => other,
        })?;

        Ok(License {
            key: key.clone(),
            organization_id: organization_id.to_string(),
            device_id: None,
            status: LicenseStatus::Available,
            activated_at: None,
        })
    }

    pub async fn get(&self, organization_id: &str, key: &LicenseKey) -> DbResult<Option<License>> {
        let row = sqlx::query(
            r#"
            SELECT key, organization_id, device_id, status, activated_at
            FROM licenses
            WHERE organization_id = ?1 AND key = ?2
            "#,
        )
        .bind(organization_id)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(license_from_row).transpose()
    }

    /// Binds a key to `device_id`.
    ///
    /// Activating again from the same device is a no-op success.
    pub async fn activate(
        &self,
        organization_id: &str,
        key: &LicenseKey,
        device_id: &str,
    ) -> DbResult<License> {
        debug!(organization_id, key = %key.masked(), device_id, "Activating license");

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT key, organization_id, device_id, status, activated_at
            FROM licenses
            WHERE organization_id = ?1 AND key = ?2
            "#,
        )
        .bind(organization_id)
        .bind(key.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let license = match row {
            Some(row) => license_from_row(&row)?,
            None => {
                warn!(key = %key.masked(), "Unknown license key");
                return Err(DbError::not_found("License", key.masked()));
            }
        };

        match license.status {
            LicenseStatus::Revoked => {
                warn!(key = %key.masked(), "Revoked license presented");
                Err(DbError::LicenseRevoked { key: key.masked() })
            }
            LicenseStatus::Active if license.device_id.as_deref() == Some(device_id) => {
                debug!(key = %key.masked(), "License already active on this device");
                Ok(license)
            }
            LicenseStatus::Active => {
                warn!(key = %key.masked(), device_id, "License bound to another device");
                Err(DbError::AlreadyActivated { key: key.masked() })
            }
            LicenseStatus::Available => {
                let now = Utc::now();
                sqlx::query(
                    r#"
                    UPDATE licenses SET status = ?3, device_id = ?4, activated_at = ?5
                    WHERE organization_id = ?1 AND key = ?2
                    "#,
                )
                .bind(organization_id)
                .bind(key.as_str())
                .bind(LicenseStatus::Active)
                .bind(device_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                info!(key = %key.masked(), device_id, "License activated");
                Ok(License {
                    device_id: Some(device_id.to_string()),
                    status: LicenseStatus::Active,
                    activated_at: Some(now),
                    ..license
                })
            }
        }
    }

    /// Whether the organization has an active license on `device_id`.
    pub async fn is_activated(&self, organization_id: &str, device_id: &str) -> DbResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM licenses
            WHERE organization_id = ?1 AND device_id = ?2 AND status = ?3
            "#,
        )
        .bind(organization_id)
        .bind(device_id)
        .bind(LicenseStatus::Active)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Revokes a key; the device it was bound to loses its activation.
    pub async fn revoke(&self, organization_id: &str, key: &LicenseKey) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE licenses SET status = ?3
            WHERE organization_id = ?1 AND key = ?2
            "#,
        )
        .bind(organization_id)
        .bind(key.as_str())
        .bind(LicenseStatus::Revoked)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("License", key.masked()));
        }
        info!(key = %key.masked(), "License revoked");
        Ok(())
    }
}

fn license_from_row(row: &SqliteRow) -> DbResult<License> {
    let key: String = row.try_get("key")?;
    let activated_at: Option<DateTime<Utc>> = row.try_get("activated_at")?;

    Ok(License {
        key: LicenseKey::parse(&key)?,
        organization_id: row.try_get("organization_id")?,
        device_id: row.try_get("device_id")?,
        status: row.try_get("status")?,
        activated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cava_core::DEFAULT_ORGANIZATION_ID as ORG;

    fn key() -> LicenseKey {
        LicenseKey::parse("abcd-efgh-1234-5678").unwrap()
    }

    #[tokio::test]
    async fn test_activation_outcomes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let licenses = db.licenses();
        licenses.issue(ORG, &key()).await.unwrap();

        assert!(!licenses.is_activated(ORG, "till-1").await.unwrap());

        let active = licenses.activate(ORG, &key(), "till-1").await.unwrap();
        assert!(active.is_active_on("till-1"));
        assert!(active.activated_at.is_some());
        assert!(licenses.is_activated(ORG, "till-1").await.unwrap());

        // Same device again: no change.
        let again = licenses.activate(ORG, &key(), "till-1").await.unwrap();
        assert_eq!(again.activated_at, active.activated_at);

        let err = licenses.activate(ORG, &key(), "till-2").await.unwrap_err();
        assert!(matches!(err, DbError::AlreadyActivated { .. }));
        assert!(!licenses.is_activated(ORG, "till-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_and_revoked() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let licenses = db.licenses();

        let err = licenses.activate(ORG, &key(), "till-1").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(err.user_message(), "License key not found");

        licenses.issue(ORG, &key()).await.unwrap();
        licenses.activate(ORG, &key(), "till-1").await.unwrap();
        licenses.revoke(ORG, &key()).await.unwrap();

        assert!(!licenses.is_activated(ORG, "till-1").await.unwrap());
        let err = licenses.activate(ORG, &key(), "till-1").await.unwrap_err();
        assert!(matches!(err, DbError::LicenseRevoked { .. }));
    }

    #[tokio::test]
    async fn test_keys_are_scoped_and_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let licenses = db.licenses();
        licenses.issue(ORG, &key()).await.unwrap();

        assert!(matches!(
            licenses.issue(ORG, &key()).await.unwrap_err(),
            DbError::UniqueViolation { .. }
        ));
        assert!(licenses.get("other-org", &key()).await.unwrap().is_none());
        assert!(matches!(
            licenses.activate("other-org", &key(), "till-1").await.unwrap_err(),
            DbError::NotFound { .. }
        ));

        let stored = licenses.get(ORG, &key()).await.unwrap().unwrap();
        assert_eq!(stored.status, LicenseStatus::Available);
        assert_eq!(stored.key.as_str(), "ABCD-EFGH-1234-5678");
    }
}
