//! # Order-State Controller
//!
//! Owns the in-progress selection and the accordion/overlay navigation.
//!
//! ## Selection Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  [Consumption] ──► [Emission] ──► [Variety] ──► [Beer type] ──► [Qty]   │
//! │       │                              │                                  │
//! │       │ Local closes the             │ Mixed + Takeaway + emission      │
//! │       │ mixed overlay                │ opens the mixed overlay          │
//! │       ▼                              ▼                                  │
//! │  Each selection advances the open accordion section to the next step.  │
//! │                                                                         │
//! │  Subtype change ──► emission cleared, Bottle-Third rule re-applied      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is total: invalid input is ignored, never an error.

use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use crate::types::{BeerVariety, ConsumptionMode, Subtype, THIRD_BEER_TYPE};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Order State
// =============================================================================

/// The single in-progress selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderState {
    pub consumption_mode: Option<ConsumptionMode>,
    /// Packaging unit ("Case", "Half-Case", ...).
    pub emission: Option<String>,
    pub subtype: Subtype,
    pub variety: BeerVariety,
    /// Product id, or the base product of a local mixed ticket.
    pub beer_type: Option<String>,
    /// Always ≥ 1.
    pub quantity: u32,
}

impl Default for OrderState {
    fn default() -> Self {
        OrderState {
            consumption_mode: None,
            emission: None,
            subtype: Subtype::Bottle,
            variety: BeerVariety::Normal,
            beer_type: None,
            quantity: 1,
        }
    }
}

impl OrderState {
    pub fn is_mixed(&self) -> bool {
        self.variety == BeerVariety::Mixed
    }

    /// Mixed case to go: built through the mixed builder only.
    pub fn is_mixed_takeaway(&self) -> bool {
        self.is_mixed() && self.consumption_mode == Some(ConsumptionMode::Takeaway)
    }

    /// Open dine-in mixed ticket priced on a base product.
    pub fn is_mixed_local(&self) -> bool {
        self.is_mixed() && self.consumption_mode == Some(ConsumptionMode::Local)
    }

    pub fn with_consumption_mode(self, mode: ConsumptionMode) -> Self {
        OrderState {
            consumption_mode: Some(mode),
            ..self
        }
    }

    pub fn with_emission(self, emission: Option<String>) -> Self {
        OrderState { emission, ..self }
    }

    pub fn with_variety(self, variety: BeerVariety) -> Self {
        OrderState { variety, ..self }
    }

    pub fn with_beer_type(self, beer_type: Option<String>) -> Self {
        OrderState { beer_type, ..self }
    }

    pub fn with_quantity(self, quantity: u32) -> Self {
        OrderState {
            quantity: quantity.clamp(1, MAX_ITEM_QUANTITY),
            ..self
        }
    }

    /// New subtype: emission cleared, Bottle-Third rule applied.
    pub fn with_subtype(self, subtype: Subtype) -> Self {
        let beer_type = if subtype == Subtype::BottleThird {
            Some(THIRD_BEER_TYPE.to_string())
        } else if self.beer_type.as_deref() == Some(THIRD_BEER_TYPE) {
            None
        } else {
            self.beer_type
        };
        OrderState {
            subtype,
            emission: None,
            beer_type,
            ..self
        }
    }
}

// =============================================================================
// Accordion Sections
// =============================================================================

/// Steps of the selection accordion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderSection {
    ConsumptionMode,
    Emission,
    Variety,
    BeerType,
    Quantity,
}

// =============================================================================
// Controller
// =============================================================================

/// Single owner of [`OrderState`].
#[derive(Debug, Clone)]
pub struct OrderController {
    state: OrderState,
    open_section: Option<OrderSection>,
    mixed_overlay_open: bool,
}

impl Default for OrderController {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderController {
    pub fn new() -> Self {
        OrderController {
            state: OrderState::default(),
            open_section: Some(OrderSection::ConsumptionMode),
            mixed_overlay_open: false,
        }
    }

    pub fn state(&self) -> &OrderState {
        &self.state
    }

    pub fn open_section(&self) -> Option<OrderSection> {
        self.open_section
    }

    pub fn is_mixed_overlay_open(&self) -> bool {
        self.mixed_overlay_open
    }

    fn update(&mut self, f: impl FnOnce(OrderState) -> OrderState) {
        let current = std::mem::take(&mut self.state);
        self.state = f(current);
    }

    pub fn select_consumption_mode(&mut self, mode: ConsumptionMode) {
        debug!(%mode, "Consumption mode selected");
        self.update(|s| s.with_consumption_mode(mode));
        self.open_section = Some(OrderSection::Emission);
        if mode == ConsumptionMode::Local {
            self.mixed_overlay_open = false;
        }
    }

    pub fn select_emission(&mut self, emission: impl Into<String>) {
        let emission = emission.into();
        debug!(emission = %emission, "Emission selected");
        self.update(|s| s.with_emission(Some(emission)));
        self.open_section = Some(OrderSection::Variety);
    }

    pub fn toggle_variety(&mut self) {
        let variety = self.state.variety.toggled();
        self.update(|s| s.with_variety(variety));

        match variety {
            BeerVariety::Mixed => {
                if self.state.is_mixed_takeaway() && self.state.emission.is_some() {
                    self.mixed_overlay_open = true;
                }
            }
            BeerVariety::Normal => self.mixed_overlay_open = false,
        }
        debug!(?variety, overlay = self.mixed_overlay_open, "Variety toggled");
    }

    /// Returns false (and changes nothing) for Mixed + Takeaway, which goes
    /// through the mixed builder instead.
    pub fn select_beer_type(&mut self, beer_type: impl Into<String>) -> bool {
        if self.state.is_mixed_takeaway() {
            return false;
        }
        let beer_type = beer_type.into();
        debug!(beer_type = %beer_type, "Beer type selected");
        self.update(|s| s.with_beer_type(Some(beer_type)));
        self.open_section = Some(OrderSection::Quantity);
        true
    }

    pub fn change_subtype(&mut self, subtype: Subtype) {
        debug!(%subtype, "Subtype changed");
        self.update(|s| s.with_subtype(subtype));
    }

    /// Bottle-Third shortcut: switches into BottleThird, or back to Bottle.
    pub fn toggle_third(&mut self) {
        let next = if self.state.subtype == Subtype::BottleThird {
            Subtype::Bottle
        } else {
            Subtype::BottleThird
        };
        self.change_subtype(next);
    }

    pub fn increment_quantity(&mut self) {
        let quantity = self.state.quantity.saturating_add(1);
        self.update(|s| s.with_quantity(quantity));
    }

    pub fn decrement_quantity(&mut self) {
        let quantity = self.state.quantity.saturating_sub(1);
        self.update(|s| s.with_quantity(quantity));
    }

    /// Quantity typed by the cashier. Empty means 1, anything non-numeric is
    /// ignored, numbers are clamped to 1..=MAX_ITEM_QUANTITY.
    pub fn set_quantity_text(&mut self, text: &str) {
        let text = text.trim();
        let quantity = if text.is_empty() {
            1
        } else {
            match text.parse::<i64>() {
                Ok(n) => n.clamp(1, i64::from(MAX_ITEM_QUANTITY)) as u32,
                Err(_) => return,
            }
        };
        self.update(|s| s.with_quantity(quantity));
    }

    /// Opens `section`, or closes it when it is already open.
    pub fn toggle_section(&mut self, section: OrderSection) {
        self.open_section = if self.open_section == Some(section) {
            None
        } else {
            Some(section)
        };
    }

    pub fn close_mixed_overlay(&mut self) {
        self.mixed_overlay_open = false;
    }

    /// Back to defaults with the first section open.
    pub fn reset(&mut self) {
        debug!("Order state reset");
        *self = OrderController::new();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
