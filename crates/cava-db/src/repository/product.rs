//! # Product Repository
//!
//! Products are identified by the name the cashier picks ("Polar Pilsen"),
//! scoped to an organization. Prices and inventory rows reference them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use cava_core::validation::validate_product_id;

/// A product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub organization_id: String,
    pub id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// repo.upsert(org, "Polar Pilsen").await?;
/// let active = repo.list_active(org).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates the product, or reactivates it if it already exists.
    ///
    /// ## Returns
    /// * `Ok(ProductRecord)` - The stored row
    /// * `Err(DbError::Core)` - Blank, too long or reserved name
    pub async fn upsert(&self, organization_id: &str, id: &str) -> DbResult<ProductRecord> {
        validate_product_id(id).map_err(cava_core::CoreError::from)?;
        let id = id.trim();
        let now = Utc::now();

        debug!(organization_id, product = %id, "Upserting product");

        sqlx::query(
            r#"
            INSERT INTO products (organization_id, id, is_active, created_at, updated_at)
            VALUES (?1, ?2, 1, ?3, ?3)
            ON CONFLICT (organization_id, id) DO UPDATE SET
                is_active = 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(organization_id)
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(organization_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by name.
    ///
    /// ## Returns
    /// * `Ok(Some(ProductRecord))` - Product found (active or not)
    /// * `Ok(None)` - Product not found
    pub async fn get(&self, organization_id: &str, id: &str) -> DbResult<Option<ProductRecord>> {
        let product = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT organization_id, id, is_active, created_at, updated_at
            FROM products
            WHERE organization_id = ?1 AND id = ?2
            "#,
        )
        .bind(organization_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, organization_id: &str) -> DbResult<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT organization_id, id, is_active, created_at, updated_at
            FROM products
            WHERE organization_id = ?1 AND is_active = 1
            ORDER BY id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed active products");
        Ok(products)
    }

    /// Hides a product from the catalog. Its history is kept.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn deactivate(&self, organization_id: &str, id: &str) -> DbResult<()> {
        debug!(organization_id, product = %id, "Deactivating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET is_active = 0, updated_at = ?3
            WHERE organization_id = ?1 AND id = ?2
            "#,
        )
        .bind(organization_id)
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }
}
