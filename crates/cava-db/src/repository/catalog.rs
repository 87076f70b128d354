//! # Catalog Repository
//!
//! Emission sizes and the in-memory [`Catalog`] snapshot a sales session
//! reads prices, stock and units from.
//!
//! ## Snapshot
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  emissions ─┐                                                           │
//! │  prices ────┼──► load(org) ──► Catalog ──► SalesSession<Catalog>        │
//! │  inventory ─┘                                                           │
//! │                                                                         │
//! │  Realtime events on prices / inventory ──► reload, replace_lookup()     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cava_core::validation::validate_emission;
use cava_core::{Catalog, CoreError, Money, PriceMode, Subtype, ValidationError};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// How many units one emission holds for a subtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmissionRecord {
    pub organization_id: String,
    pub name: String,
    pub subtype: Subtype,
    pub units: i64,
}

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Declares (or resizes) an emission.
    pub async fn upsert_emission(
        &self,
        organization_id: &str,
        name: &str,
        subtype: Subtype,
        units: u32,
    ) -> DbResult<()> {
        validate_emission(name).map_err(CoreError::from)?;
        if units == 0 {
            return Err(CoreError::from(ValidationError::OutOfRange {
                field: "emission units".to_string(),
                min: 1,
                max: i64::from(u32::MAX),
            })
            .into());
        }

        debug!(organization_id, emission = %name, %subtype, units, "Upserting emission");

        sqlx::query(
            r#"
            INSERT INTO emissions (organization_id, name, subtype, units)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (organization_id, name, subtype) DO UPDATE SET
                units = excluded.units
            "#,
        )
        .bind(organization_id)
        .bind(name.trim())
        .bind(subtype)
        .bind(i64::from(units))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_emissions(&self, organization_id: &str) -> DbResult<Vec<EmissionRecord>> {
        let emissions = sqlx::query_as::<_, EmissionRecord>(
            r#"
            SELECT organization_id, name, subtype, units
            FROM emissions
            WHERE organization_id = ?1
            ORDER BY subtype, name
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(emissions)
    }

    /// Builds a snapshot of everything the order controllers look up.
    ///
    /// Only active products contribute prices and stock.
    pub async fn load(&self, organization_id: &str) -> DbResult<Catalog> {
        let mut catalog = Catalog::new();

        for emission in self.list_emissions(organization_id).await? {
            let units = u32::try_from(emission.units).unwrap_or(0);
            catalog.set_emission(emission.name, emission.subtype, units);
        }

        let prices: Vec<(String, String, Subtype, bool, i64, i64)> = sqlx::query_as(
            r#"
            SELECT pr.product_id, pr.emission, pr.subtype, pr.is_local,
                   pr.price_cents, pr.price_bs_cents
            FROM prices pr
            INNER JOIN products p
                ON p.organization_id = pr.organization_id AND p.id = pr.product_id
            WHERE pr.organization_id = ?1 AND p.is_active = 1
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let price_count = prices.len();
        for (product, emission, subtype, is_local, cents, bs_cents) in prices {
            let mode = if is_local {
                PriceMode::Local
            } else {
                PriceMode::Standard
            };
            catalog.set_price(
                product,
                emission,
                subtype,
                mode,
                Money::from_cents(cents),
                Money::from_cents(bs_cents),
            );
        }

        let stock: Vec<(String, Subtype, i64)> = sqlx::query_as(
            r#"
            SELECT i.product_id, i.subtype, i.units
            FROM inventory i
            INNER JOIN products p
                ON p.organization_id = i.organization_id AND p.id = i.product_id
            WHERE i.organization_id = ?1 AND p.is_active = 1
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let stock_count = stock.len();
        for (product, subtype, units) in stock {
            catalog.set_stock(product, subtype, units);
        }

        debug!(organization_id, prices = price_count, stock = stock_count, "Catalog loaded");
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use cava_core::{
        Money, PriceLookup, PriceMode, StockLookup, Subtype, UnitLookup,
        DEFAULT_ORGANIZATION_ID as ORG,
    };

    #[tokio::test]
    async fn test_load_snapshot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        catalog.upsert_emission(ORG, "Case", Subtype::Bottle, 36).await.unwrap();
        catalog.upsert_emission(ORG, "Case", Subtype::Can, 24).await.unwrap();
        db.products().upsert(ORG, "Solera").await.unwrap();
        db.prices()
            .upsert(
                ORG,
                "Solera",
                "Case",
                Subtype::Bottle,
                PriceMode::Standard,
                Money::from_cents(3100),
                Money::from_cents(124_000),
            )
            .await
            .unwrap();
        db.inventory().set_units(ORG, "Solera", Subtype::Bottle, 40).await.unwrap();

        let snapshot = catalog.load(ORG).await.unwrap();
        assert_eq!(snapshot.units_per_emission("Case", Subtype::Can), Some(24));
        assert_eq!(
            snapshot.price("Solera", "Case", Subtype::Bottle, PriceMode::Standard),
            Money::from_cents(3100)
        );
        assert!(snapshot.check_stock("Solera", "Case", Subtype::Bottle, 1));
        assert!(!snapshot.check_stock("Solera", "Case", Subtype::Bottle, 2));
    }

    #[tokio::test]
    async fn test_inactive_products_are_left_out() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().upsert(ORG, "Zulia").await.unwrap();
        db.prices()
            .upsert(
                ORG,
                "Zulia",
                "Unit",
                Subtype::Bottle,
                PriceMode::Local,
                Money::from_cents(150),
                Money::from_cents(6000),
            )
            .await
            .unwrap();
        db.products().deactivate(ORG, "Zulia").await.unwrap();

        let snapshot = db.catalog().load(ORG).await.unwrap();
        assert!(snapshot.products_for(Subtype::Bottle).is_empty());
    }

    #[tokio::test]
    async fn test_zero_unit_emission_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.catalog().upsert_emission(ORG, "Case", Subtype::Bottle, 0).await.is_err());
    }
}
