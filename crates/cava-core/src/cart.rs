//! # Cart Controller
//!
//! Owns the list of committed line items.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderController.state()                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  is_selection_complete? ── no ──► Ok(None), nothing changes             │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  StockValidator ── Err ──► returned as-is, nothing changes              │
//! │       │ Ok                                                              │
//! │       ▼                                                                 │
//! │  Mixed + Local? ── yes ──► beer_type "Mixed (<base>)", priced as base   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  push CartItem { id: UUID v4, ... }  ──►  OrderController.reset()       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mixed takeaway cases skip this path entirely: they are committed with
//! [`Cart::add_mixed`] once the mixed builder says the case is complete.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::formatters::mixed_label;
use crate::lookup::{PriceLookup, StockValidator, UnitLookup};
use crate::mixed::{MixedComposition, MixedPrice};
use crate::money::Money;
use crate::order_state::{OrderController, OrderState};
use crate::types::{BeerVariety, ConsumptionMode, PriceMode, Subtype};
use crate::validation::validate_cart_size;

/// Beer type recorded on mixed takeaway cases.
pub const MIXED_BEER_TYPE: &str = "Mixed";

// =============================================================================
// Cart Item
// =============================================================================

/// A committed line. Never edited after creation, only removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// UUID v4.
    pub id: String,
    pub consumption_mode: Option<ConsumptionMode>,
    pub emission: Option<String>,
    pub subtype: Subtype,
    pub variety: BeerVariety,
    pub beer_type: Option<String>,
    pub quantity: u32,
    /// Base product of a local mixed ticket, kept for display.
    pub display_base: Option<String>,
    /// Frozen composition of a mixed takeaway case.
    pub composition: Option<MixedComposition>,
    pub unit_price: Money,
    pub unit_price_bs: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    pub fn line_total_bs(&self) -> Money {
        self.unit_price_bs.multiply_quantity(self.quantity)
    }

    pub fn is_takeaway(&self) -> bool {
        self.consumption_mode == Some(ConsumptionMode::Takeaway)
    }

    /// Product whose inventory this line draws from (single-product lines).
    pub fn stock_product(&self) -> Option<&str> {
        self.display_base.as_deref().or(self.beer_type.as_deref())
    }

    /// Units of `product`/`subtype` this line takes from stock.
    pub fn units_of(&self, product: &str, subtype: Subtype, units: &dyn UnitLookup) -> i64 {
        if self.subtype != subtype {
            return 0;
        }
        if let Some(composition) = &self.composition {
            return i64::from(composition.count(product)) * i64::from(self.quantity);
        }
        if self.stock_product() != Some(product) {
            return 0;
        }
        let per = self
            .emission
            .as_deref()
            .and_then(|e| units.units_per_emission(e, subtype))
            .unwrap_or(1);
        i64::from(per) * i64::from(self.quantity)
    }
}

/// Totals for the ticket summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: u32,
    pub total: Money,
    pub total_bs: Money,
}

// =============================================================================
// Selection Completeness
// =============================================================================

/// Whether the selection can be committed directly.
///
/// - Mixed + Takeaway: never (goes through the mixed builder)
/// - Mixed + Local: emission and beer type
/// - Normal: consumption mode, emission and beer type
pub fn is_selection_complete(order: &OrderState) -> bool {
    match (order.variety, order.consumption_mode) {
        (BeerVariety::Mixed, Some(ConsumptionMode::Takeaway)) => false,
        (BeerVariety::Mixed, Some(ConsumptionMode::Local)) => {
            order.emission.is_some() && order.beer_type.is_some()
        }
        (BeerVariety::Mixed, None) => false,
        (BeerVariety::Normal, mode) => {
            mode.is_some() && order.emission.is_some() && order.beer_type.is_some()
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Single owner of the committed items.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_takeaway(&self) -> bool {
        self.items.iter().any(CartItem::is_takeaway)
    }

    /// Commits the current selection.
    ///
    /// ## Returns
    /// - `Ok(None)` when the selection is incomplete (nothing changes)
    /// - `Err(_)` when the stock validator rejects it (nothing changes)
    /// - `Ok(Some(item))` after the item is appended and the order reset
    pub fn add_to_cart(
        &mut self,
        orders: &mut OrderController,
        validator: &dyn StockValidator,
        prices: &dyn PriceLookup,
    ) -> CoreResult<Option<CartItem>> {
        let order = orders.state();
        if !is_selection_complete(order) {
            debug!("Selection incomplete, nothing committed");
            return Ok(None);
        }

        validate_cart_size(self.items.len() + 1)?;
        validator.validate(order, self)?;

        let item = build_item(order, prices);
        info!(
            id = %item.id,
            beer_type = ?item.beer_type,
            quantity = item.quantity,
            "Item added to cart"
        );
        self.items.push(item.clone());
        orders.reset();
        Ok(Some(item))
    }

    /// Commits a completed mixed takeaway case at the given unit prices.
    ///
    /// The composition is copied into the line, so the caller's builder is
    /// untouched when the cart is already full.
    pub fn add_mixed(
        &mut self,
        order: &OrderState,
        composition: &MixedComposition,
        price: MixedPrice,
    ) -> CoreResult<CartItem> {
        validate_cart_size(self.items.len() + 1)?;

        let item = CartItem {
            id: Uuid::new_v4().to_string(),
            consumption_mode: order.consumption_mode,
            emission: order.emission.clone(),
            subtype: order.subtype,
            variety: BeerVariety::Mixed,
            beer_type: Some(MIXED_BEER_TYPE.to_string()),
            quantity: 1,
            display_base: None,
            composition: Some(composition.clone()),
            unit_price: price.price,
            unit_price_bs: price.price_bs,
        };
        info!(
            id = %item.id,
            units = composition.total_units(),
            "Mixed case added to cart"
        );
        self.items.push(item.clone());
        Ok(item)
    }

    /// Removes an item by id. Returns whether something was removed.
    pub fn remove_item(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Units of a product already promised to items in the cart.
    pub fn reserved_units(&self, product: &str, subtype: Subtype, units: &dyn UnitLookup) -> i64 {
        self.items
            .iter()
            .map(|i| i.units_of(product, subtype, units))
            .sum()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals {
            item_count: self.items.len(),
            total_quantity: self.items.iter().map(|i| i.quantity).sum(),
            total: self.items.iter().map(CartItem::line_total).sum(),
            total_bs: self.items.iter().map(CartItem::line_total_bs).sum(),
        }
    }
}

/// Snapshot of a complete selection as a cart item.
fn build_item(order: &OrderState, prices: &dyn PriceLookup) -> CartItem {
    // Completeness was checked by the caller.
    let emission = order.emission.clone().unwrap_or_default();
    let base = order.beer_type.clone().unwrap_or_default();

    let (beer_type, display_base, mode) = if order.is_mixed_local() {
        (mixed_label(&base), Some(base.clone()), PriceMode::Local)
    } else {
        let mode = order
            .consumption_mode
            .map(|m| m.price_mode())
            .unwrap_or(PriceMode::Standard);
        (base.clone(), None, mode)
    };

    CartItem {
        id: Uuid::new_v4().to_string(),
        consumption_mode: order.consumption_mode,
        emission: order.emission.clone(),
        subtype: order.subtype,
        variety: order.variety,
        beer_type: Some(beer_type),
        quantity: order.quantity,
        display_base,
        composition: None,
        unit_price: prices.price(&base, &emission, order.subtype, mode),
        unit_price_bs: prices.price_bs(&base, &emission, order.subtype, mode),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
