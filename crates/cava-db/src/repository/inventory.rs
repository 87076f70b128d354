//! # Inventory Repository
//!
//! Stock in single units per (organization, product, subtype). Products with
//! no row are not tracked and never block a sale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeEvent, RealtimeHub};
use cava_core::{ChangeKind, Subtype};

pub const INVENTORY_TABLE: &str = "inventory";

/// An inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub organization_id: String,
    pub product_id: String,
    pub subtype: Subtype,
    pub units: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Record id used in change events.
    pub fn record_id(&self) -> String {
        inventory_record_id(&self.product_id, self.subtype)
    }

    pub(crate) fn change_event(&self, kind: ChangeKind) -> DbResult<ChangeEvent> {
        Ok(ChangeEvent::new(
            kind,
            INVENTORY_TABLE,
            self.organization_id.clone(),
            self.record_id(),
            serde_json::to_value(self)?,
        ))
    }
}

pub(crate) fn inventory_record_id(product_id: &str, subtype: Subtype) -> String {
    format!("{}/{}", product_id, subtype)
}

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    hub: RealtimeHub,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool, hub: RealtimeHub) -> Self {
        InventoryRepository { pool, hub }
    }

    /// Sets the units on hand (stock count).
    pub async fn set_units(
        &self,
        organization_id: &str,
        product_id: &str,
        subtype: Subtype,
        units: i64,
    ) -> DbResult<InventoryRecord> {
        info!(organization_id, product = %product_id, %subtype, units, "Setting stock");

        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            INSERT INTO inventory (organization_id, product_id, subtype, units, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (organization_id, product_id, subtype) DO UPDATE SET
                units = excluded.units,
                updated_at = excluded.updated_at
            RETURNING organization_id, product_id, subtype, units, updated_at
            "#,
        )
        .bind(organization_id)
        .bind(product_id)
        .bind(subtype)
        .bind(units)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        self.hub.publish(record.change_event(ChangeKind::Update)?).await;
        Ok(record)
    }

    /// Adds `delta` units (negative to remove) to a tracked product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product has no inventory row
    pub async fn adjust(
        &self,
        organization_id: &str,
        product_id: &str,
        subtype: Subtype,
        delta: i64,
    ) -> DbResult<InventoryRecord> {
        debug!(organization_id, product = %product_id, %subtype, delta, "Adjusting stock");

        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            UPDATE inventory SET
                units = units + ?4,
                updated_at = ?5
            WHERE organization_id = ?1 AND product_id = ?2 AND subtype = ?3
            RETURNING organization_id, product_id, subtype, units, updated_at
            "#,
        )
        .bind(organization_id)
        .bind(product_id)
        .bind(subtype)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Inventory", inventory_record_id(product_id, subtype)))?;

        self.hub.publish(record.change_event(ChangeKind::Update)?).await;
        Ok(record)
    }

    pub async fn get(
        &self,
        organization_id: &str,
        product_id: &str,
        subtype: Subtype,
    ) -> DbResult<Option<InventoryRecord>> {
        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT organization_id, product_id, subtype, units, updated_at
            FROM inventory
            WHERE organization_id = ?1 AND product_id = ?2 AND subtype = ?3
            "#,
        )
        .bind(organization_id)
        .bind(product_id)
        .bind(subtype)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn list(&self, organization_id: &str) -> DbResult<Vec<InventoryRecord>> {
        let records = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT organization_id, product_id, subtype, units, updated_at
            FROM inventory
            WHERE organization_id = ?1
            ORDER BY product_id, subtype
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
