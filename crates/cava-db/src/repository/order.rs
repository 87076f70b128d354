//! # Order Repository
//!
//! Persists finalized tickets and takes their units out of inventory.
//!
//! ## Submit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    submit(ticket) - ONE TRANSACTION                     │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── INSERT orders ... ON CONFLICT (id) DO UPDATE                      │
//! │   ├── INSERT order_items ... ON CONFLICT (id) DO UPDATE   (×N lines)    │
//! │   ├── For each line not stored before:                                  │
//! │   │     units per product = composition counts × qty (mixed case)       │
//! │   │                       = emission units × qty     (everything else)  │
//! │   └── UPDATE inventory SET units = units - n   (tracked products only)  │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  After commit: publish orders + inventory change events                 │
//! │                                                                         │
//! │  Any failure (stock ran out on another register, FK, ...) rolls back    │
//! │  everything; the ticket is not stored and stock is untouched.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeEvent, RealtimeHub};
use crate::repository::inventory::{InventoryRecord, INVENTORY_TABLE};
use cava_core::validation::{
    validate_organization_id, validate_payment_reference, validate_quantity,
};
use cava_core::{
    CartItem, Catalog, ChangeKind, CoreError, MixedComposition, Money, PaymentMethod, Subtype,
    Ticket, TicketStatus,
};

pub const ORDERS_TABLE: &str = "orders";

const ORDER_COLUMNS: &str = r#"
    id, organization_id, ticket_number, ticket_date, customer_name,
    payment_method, payment_reference, status, total_cents, total_bs_cents, created_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, consumption_mode, emission, subtype, variety, beer_type, display_base,
    composition, quantity, unit_price_cents, unit_price_bs_cents
"#;

/// Repository for orders and their lines.
///
/// ## Usage
/// ```rust,ignore
/// let ticket = session.finalize()?;
/// db.orders().submit(&ticket).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    hub: RealtimeHub,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool, hub: RealtimeHub) -> Self {
        OrderRepository { pool, hub }
    }

    /// Stores a ticket and decrements inventory, atomically.
    ///
    /// Submitting the same ticket again updates the header (payment,
    /// status, customer) and only takes stock for lines that were not
    /// stored yet.
    ///
    /// ## Returns
    /// * `Ok(Vec<InventoryRecord>)` - Inventory rows after the decrement
    /// * `Err(DbError::Core(InsufficientStock))` - Stock ran out meanwhile
    /// * `Err(DbError::Core(EmptyCart))` - Ticket without lines
    pub async fn submit(&self, ticket: &Ticket) -> DbResult<Vec<InventoryRecord>> {
        if ticket.items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        validate_organization_id(&ticket.organization_id).map_err(CoreError::from)?;
        for item in &ticket.items {
            validate_quantity(i64::from(item.quantity)).map_err(CoreError::from)?;
        }

        debug!(
            id = %ticket.id,
            number = ticket.number,
            lines = ticket.items.len(),
            "Submitting order"
        );

        let mut tx = self.pool.begin().await?;

        let existed = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE id = ?1")
            .bind(&ticket.id)
            .fetch_one(&mut *tx)
            .await?
            > 0;
        let stored_lines: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT id FROM order_items WHERE order_id = ?1")
                .bind(&ticket.id)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, organization_id, ticket_number, ticket_date, customer_name,
                payment_method, payment_reference, status, total_cents, total_bs_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (id) DO UPDATE SET
                customer_name = excluded.customer_name,
                payment_method = excluded.payment_method,
                payment_reference = excluded.payment_reference,
                status = excluded.status,
                total_cents = excluded.total_cents,
                total_bs_cents = excluded.total_bs_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.organization_id)
        .bind(i64::from(ticket.number))
        .bind(&ticket.date)
        .bind(&ticket.customer_name)
        .bind(ticket.payment_method)
        .bind(&ticket.payment_reference)
        .bind(ticket.status)
        .bind(ticket.total.cents())
        .bind(ticket.total_bs.cents())
        .bind(ticket.created_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, item) in ticket.items.iter().enumerate() {
            upsert_item(&mut tx, &ticket.id, position, item).await?;
        }

        let new_lines: Vec<&CartItem> = ticket
            .items
            .iter()
            .filter(|item| !stored_lines.contains(&item.id))
            .collect();
        let updated = take_stock(&mut tx, &ticket.organization_id, &new_lines).await?;

        tx.commit().await?;

        info!(
            id = %ticket.id,
            number = ticket.number,
            status = ?ticket.status,
            total = %ticket.total,
            "Order stored"
        );

        let kind = if existed {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        self.hub
            .publish(ChangeEvent::new(
                kind,
                ORDERS_TABLE,
                ticket.organization_id.clone(),
                ticket.id.clone(),
                serde_json::to_value(ticket)?,
            ))
            .await;
        for record in &updated {
            self.hub.publish(record.change_event(ChangeKind::Update)?).await;
        }

        Ok(updated)
    }

    /// Settles an open ticket.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No open ticket with that id
    /// * `Err(DbError::Core)` - Reference missing or malformed for the method
    pub async fn mark_paid(
        &self,
        id: &str,
        method: PaymentMethod,
        reference: Option<&str>,
    ) -> DbResult<Ticket> {
        let reference = reference.map(str::trim).filter(|r| !r.is_empty());
        validate_payment_reference(method, reference.unwrap_or_default())
            .map_err(CoreError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?2,
                payment_method = ?3,
                payment_reference = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = ?6
            "#,
        )
        .bind(id)
        .bind(TicketStatus::Paid)
        .bind(method)
        .bind(reference.filter(|_| method.requires_reference()))
        .bind(Utc::now())
        .bind(TicketStatus::Open)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Open ticket", id));
        }

        let ticket = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        info!(id, number = ticket.number, method = method.label(), "Ticket paid");
        self.hub
            .publish(ChangeEvent::new(
                ChangeKind::Update,
                ORDERS_TABLE,
                ticket.organization_id.clone(),
                ticket.id.clone(),
                serde_json::to_value(&ticket)?,
            ))
            .await;
        Ok(ticket)
    }

    /// Gets an order with its lines, in ticket order.
    pub async fn get(&self, id: &str) -> DbResult<Option<Ticket>> {
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.items(id).await?;
                Ok(Some(ticket_from_row(&row, items)?))
            }
            None => Ok(None),
        }
    }

    /// Most recent orders first, optionally filtered by status.
    pub async fn list(
        &self,
        organization_id: &str,
        status: Option<TicketStatus>,
        limit: u32,
    ) -> DbResult<Vec<Ticket>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM orders
            WHERE organization_id = ?1 AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
            ORDER_COLUMNS
        ))
        .bind(organization_id)
        .bind(status)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let items = self.items(&id).await?;
            tickets.push(ticket_from_row(&row, items)?);
        }
        Ok(tickets)
    }

    /// Number of the latest ticket, 0 when none was stored yet.
    pub async fn last_ticket_number(&self, organization_id: &str) -> DbResult<u16> {
        let number = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT ticket_number FROM orders
            WHERE organization_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        match number {
            Some(n) => u16::try_from(n)
                .map_err(|_| DbError::Internal(format!("ticket number out of range: {}", n))),
            None => Ok(0),
        }
    }

    async fn items(&self, order_id: &str) -> DbResult<Vec<CartItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY position",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

async fn upsert_item(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &str,
    position: usize,
    item: &CartItem,
) -> DbResult<()> {
    let composition = item
        .composition
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, position, consumption_mode, emission, subtype, variety,
            beer_type, display_base, composition, quantity,
            unit_price_cents, unit_price_bs_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT (id) DO UPDATE SET
            position = excluded.position,
            quantity = excluded.quantity,
            unit_price_cents = excluded.unit_price_cents,
            unit_price_bs_cents = excluded.unit_price_bs_cents
        "#,
    )
    .bind(&item.id)
    .bind(order_id)
    .bind(position as i64)
    .bind(item.consumption_mode)
    .bind(&item.emission)
    .bind(item.subtype)
    .bind(item.variety)
    .bind(&item.beer_type)
    .bind(&item.display_base)
    .bind(composition)
    .bind(i64::from(item.quantity))
    .bind(item.unit_price.cents())
    .bind(item.unit_price_bs.cents())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Decrements tracked inventory for `lines`, failing when any product would
/// go below zero.
async fn take_stock(
    tx: &mut Transaction<'_, Sqlite>,
    organization_id: &str,
    lines: &[&CartItem],
) -> DbResult<Vec<InventoryRecord>> {
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let emissions: Vec<(String, Subtype, i64)> =
        sqlx::query_as("SELECT name, subtype, units FROM emissions WHERE organization_id = ?1")
            .bind(organization_id)
            .fetch_all(&mut **tx)
            .await?;
    let mut sizes = Catalog::new();
    for (name, subtype, units) in emissions {
        sizes.set_emission(name, subtype, u32::try_from(units).unwrap_or(1));
    }

    let mut needed: BTreeMap<(String, Subtype), i64> = BTreeMap::new();
    for item in lines {
        let products: Vec<&str> = match &item.composition {
            Some(composition) => composition.products().collect(),
            None => item.stock_product().into_iter().collect(),
        };
        for product in products {
            let units = item.units_of(product, item.subtype, &sizes);
            if units > 0 {
                *needed.entry((product.to_string(), item.subtype)).or_insert(0) += units;
            }
        }
    }

    let now = Utc::now();
    let mut updated = Vec::new();
    for ((product, subtype), units) in needed {
        let available = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT units FROM inventory
            WHERE organization_id = ?1 AND product_id = ?2 AND subtype = ?3
            "#,
        )
        .bind(organization_id)
        .bind(&product)
        .bind(subtype)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(available) = available else {
            debug!(product = %product, %subtype, "Untracked product, no stock taken");
            continue;
        };
        if available < units {
            warn!(
                product = %product,
                %subtype,
                available,
                requested = units,
                "Stock ran out before submit"
            );
            return Err(CoreError::InsufficientStock {
                product,
                available,
                requested: units,
            }
            .into());
        }

        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            UPDATE inventory SET units = units - ?4, updated_at = ?5
            WHERE organization_id = ?1 AND product_id = ?2 AND subtype = ?3
            RETURNING organization_id, product_id, subtype, units, updated_at
            "#,
        )
        .bind(organization_id)
        .bind(&product)
        .bind(subtype)
        .bind(units)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        updated.push(record);
    }

    debug!(table = INVENTORY_TABLE, rows = updated.len(), "Stock taken");
    Ok(updated)
}

// =============================================================================
// Row Mapping
// =============================================================================

fn ticket_from_row(row: &SqliteRow, items: Vec<CartItem>) -> DbResult<Ticket> {
    let number: i64 = row.try_get("ticket_number")?;

    Ok(Ticket {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        number: u16::try_from(number)
            .map_err(|_| DbError::Internal(format!("ticket number out of range: {}", number)))?,
        date: row.try_get("ticket_date")?,
        created_at: row.try_get("created_at")?,
        customer_name: row.try_get("customer_name")?,
        payment_method: row.try_get("payment_method")?,
        payment_reference: row.try_get("payment_reference")?,
        status: row.try_get("status")?,
        items,
        total: Money::from_cents(row.try_get("total_cents")?),
        total_bs: Money::from_cents(row.try_get("total_bs_cents")?),
    })
}

fn item_from_row(row: &SqliteRow) -> DbResult<CartItem> {
    let composition: Option<String> = row.try_get("composition")?;
    let composition = composition
        .map(|json| serde_json::from_str::<MixedComposition>(&json))
        .transpose()?;
    let quantity: i64 = row.try_get("quantity")?;

    Ok(CartItem {
        id: row.try_get("id")?,
        consumption_mode: row.try_get("consumption_mode")?,
        emission: row.try_get("emission")?,
        subtype: row.try_get("subtype")?,
        variety: row.try_get("variety")?,
        beer_type: row.try_get("beer_type")?,
        quantity: u32::try_from(quantity)
            .map_err(|_| DbError::Internal(format!("quantity out of range: {}", quantity)))?,
        display_base: row.try_get("display_base")?,
        composition,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        unit_price_bs: Money::from_cents(row.try_get("unit_price_bs_cents")?),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
