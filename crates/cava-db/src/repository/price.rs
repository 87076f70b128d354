//! # Price Repository
//!
//! One row per (product, emission, subtype, locality), both currencies.
//! Writes are upserts on that key and are announced on the `prices` channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::realtime::{ChangeEvent, RealtimeHub};
use cava_core::validation::{validate_emission, validate_price_cents};
use cava_core::{ChangeKind, CoreError, Money, PriceMode, Subtype};

pub const PRICES_TABLE: &str = "prices";

/// A price row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub organization_id: String,
    pub product_id: String,
    pub emission: String,
    pub subtype: Subtype,
    pub is_local: bool,
    pub price_cents: i64,
    pub price_bs_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn mode(&self) -> PriceMode {
        if self.is_local {
            PriceMode::Local
        } else {
            PriceMode::Standard
        }
    }

    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn price_bs(&self) -> Money {
        Money::from_cents(self.price_bs_cents)
    }

    /// Record id used in change events.
    pub fn record_id(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.product_id,
            self.emission,
            self.subtype,
            if self.is_local { "local" } else { "standard" }
        )
    }
}

#[derive(Debug, Clone)]
pub struct PriceRepository {
    pool: SqlitePool,
    hub: RealtimeHub,
}

impl PriceRepository {
    pub fn new(pool: SqlitePool, hub: RealtimeHub) -> Self {
        PriceRepository { pool, hub }
    }

    /// Sets both prices of a combination.
    ///
    /// ## Returns
    /// * `Ok(PriceRecord)` - The stored row
    /// * `Err(DbError::ForeignKeyViolation)` - Product was never created
    /// * `Err(DbError::Core)` - Negative price or blank emission
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        &self,
        organization_id: &str,
        product_id: &str,
        emission: &str,
        subtype: Subtype,
        mode: PriceMode,
        price: Money,
        price_bs: Money,
    ) -> DbResult<PriceRecord> {
        validate_emission(emission).map_err(CoreError::from)?;
        validate_price_cents(price.cents()).map_err(CoreError::from)?;
        validate_price_cents(price_bs.cents()).map_err(CoreError::from)?;

        debug!(
            organization_id,
            product = %product_id,
            emission,
            %subtype,
            ?mode,
            %price,
            "Upserting price"
        );

        let record = sqlx::query_as::<_, PriceRecord>(
            r#"
            INSERT INTO prices (
                organization_id, product_id, emission, subtype, is_local,
                price_cents, price_bs_cents, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (organization_id, product_id, emission, subtype, is_local) DO UPDATE SET
                price_cents = excluded.price_cents,
                price_bs_cents = excluded.price_bs_cents,
                updated_at = excluded.updated_at
            RETURNING organization_id, product_id, emission, subtype, is_local,
                      price_cents, price_bs_cents, updated_at
            "#,
        )
        .bind(organization_id)
        .bind(product_id)
        .bind(emission.trim())
        .bind(subtype)
        .bind(mode.is_local())
        .bind(price.cents())
        .bind(price_bs.cents())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        self.hub
            .publish(ChangeEvent::new(
                ChangeKind::Update,
                PRICES_TABLE,
                organization_id,
                record.record_id(),
                serde_json::to_value(&record)?,
            ))
            .await;

        Ok(record)
    }

    /// Exact price row, if configured.
    pub async fn find(
        &self,
        organization_id: &str,
        product_id: &str,
        emission: &str,
        subtype: Subtype,
        mode: PriceMode,
    ) -> DbResult<Option<PriceRecord>> {
        let record = sqlx::query_as::<_, PriceRecord>(
            r#"
            SELECT organization_id, product_id, emission, subtype, is_local,
                   price_cents, price_bs_cents, updated_at
            FROM prices
            WHERE organization_id = ?1 AND product_id = ?2 AND emission = ?3
              AND subtype = ?4 AND is_local = ?5
            "#,
        )
        .bind(organization_id)
        .bind(product_id)
        .bind(emission)
        .bind(subtype)
        .bind(mode.is_local())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// All prices of one product.
    pub async fn list_for_product(
        &self,
        organization_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<PriceRecord>> {
        let records = sqlx::query_as::<_, PriceRecord>(
            r#"
            SELECT organization_id, product_id, emission, subtype, is_local,
                   price_cents, price_bs_cents, updated_at
            FROM prices
            WHERE organization_id = ?1 AND product_id = ?2
            ORDER BY subtype, emission, is_local
            "#,
        )
        .bind(organization_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::{Database, DbConfig};
    use cava_core::DEFAULT_ORGANIZATION_ID as ORG;

    async fn db_with_solera() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().upsert(ORG, "Solera").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let db = db_with_solera().await;
        let prices = db.prices();

        for cents in [3000, 3100] {
            prices
                .upsert(
                    ORG,
                    "Solera",
                    "Case",
                    Subtype::Bottle,
                    PriceMode::Standard,
                    Money::from_cents(cents),
                    Money::from_cents(cents * 40),
                )
                .await
                .unwrap();
        }
        prices
            .upsert(
                ORG,
                "Solera",
                "Case",
                Subtype::Bottle,
                PriceMode::Local,
                Money::from_cents(3500),
                Money::from_cents(140_000),
            )
            .await
            .unwrap();

        let all = prices.list_for_product(ORG, "Solera").await.unwrap();
        assert_eq!(all.len(), 2);

        let standard = prices
            .find(ORG, "Solera", "Case", Subtype::Bottle, PriceMode::Standard)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(standard.price(), Money::from_cents(3100));
        assert_eq!(standard.price_bs(), Money::from_cents(124_000));
        assert_eq!(standard.mode(), PriceMode::Standard);
        assert_eq!(standard.record_id(), "Solera/Case/bottle/standard");
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let db = db_with_solera().await;
        let err = db
            .prices()
            .upsert(
                ORG,
                "Regional",
                "Case",
                Subtype::Bottle,
                PriceMode::Standard,
                Money::from_cents(100),
                Money::from_cents(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_negative_price_is_rejected() {
        let db = db_with_solera().await;
        let err = db
            .prices()
            .upsert(
                ORG,
                "Solera",
                "Case",
                Subtype::Bottle,
                PriceMode::Standard,
                Money::from_cents(-1),
                Money::zero(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }
}
