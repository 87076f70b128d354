//! # Sales Session
//!
//! Wires the four controllers to one lookup implementation and exposes the
//! intents the view layer sends.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           SalesSession<L>                               │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌──────────────┐  ┌────────┐  ┌────────────────┐  │
//! │  │ OrderController │  │ MixedBuilder │  │  Cart  │  │   TicketFlow   │  │
//! │  └────────┬────────┘  └──────┬───────┘  └───┬────┘  └───────┬────────┘  │
//! │           │                  │              │               │           │
//! │           └──────────────────┴──────┬───────┴───────────────┘           │
//! │                                     ▼                                   │
//! │                 L: PriceLookup + StockLookup + UnitLookup               │
//! │                 (a Catalog in tests, loaded from SQLite in the app)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock checks made through the session count the units already promised
//! to lines in the cart.

use tracing::{debug, info, warn};

use crate::cart::{Cart, CartItem};
use crate::error::{CoreError, CoreResult};
use crate::lookup::{PriceLookup, StockLookup, StockValidator, UnitLookup, UNIT_EMISSION};
use crate::mixed::{MixedPrice, MixedValidation};
use crate::mixed_builder::MixedBuilder;
use crate::order_state::{OrderController, OrderSection, OrderState};
use crate::ticket_flow::{Ticket, TicketFlow, TicketNumberSource, TicketStep};
use crate::types::{ConsumptionMode, PaymentMethod, PriceMode, Subtype};

// =============================================================================
// Cart-Aware Stock
// =============================================================================

/// Stock view that subtracts what the cart already holds.
struct ReservedStock<'a, L> {
    lookup: &'a L,
    cart: &'a Cart,
}

impl<L: StockLookup + UnitLookup> ReservedStock<'_, L> {
    fn units(&self, emission: &str, subtype: Subtype, quantity: u32) -> i64 {
        let per = self.lookup.units_per_emission(emission, subtype).unwrap_or(1);
        i64::from(per) * i64::from(quantity)
    }

    fn reserved(&self, product: &str, subtype: Subtype) -> i64 {
        self.cart.reserved_units(product, subtype, self.lookup)
    }

    fn has_units(&self, product: &str, subtype: Subtype, units: i64) -> bool {
        match u32::try_from(units) {
            Ok(units) => self.lookup.check_stock(product, UNIT_EMISSION, subtype, units),
            Err(_) => false,
        }
    }
}

impl<L: StockLookup + UnitLookup> StockLookup for ReservedStock<'_, L> {
    fn check_stock(&self, product: &str, emission: &str, subtype: Subtype, quantity: u32) -> bool {
        let total = self.reserved(product, subtype) + self.units(emission, subtype, quantity);
        self.has_units(product, subtype, total)
    }

    fn available_units(&self, product: &str, subtype: Subtype) -> Option<i64> {
        self.lookup
            .available_units(product, subtype)
            .map(|a| (a - self.reserved(product, subtype)).max(0))
    }
}

impl<L: StockLookup + UnitLookup> ReservedStock<'_, L> {
    /// Commit-time check for a single-product line.
    fn validate(&self, order: &OrderState) -> CoreResult<()> {
        let (Some(product), Some(emission)) =
            (order.beer_type.as_deref(), order.emission.as_deref())
        else {
            return Ok(());
        };
        if self.check_stock(product, emission, order.subtype, order.quantity) {
            return Ok(());
        }
        let requested = self.units(emission, order.subtype, order.quantity);
        warn!(product, requested, "Insufficient stock for line");
        Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available: StockLookup::available_units(self, product, order.subtype).unwrap_or(0),
            requested,
        })
    }
}

/// Commit-time validator over the cart being committed to.
struct CartAwareStock<'a, L>(&'a L);

impl<L: StockLookup + UnitLookup> StockValidator for CartAwareStock<'_, L> {
    fn validate(&self, order: &OrderState, cart: &Cart) -> CoreResult<()> {
        ReservedStock {
            lookup: self.0,
            cart,
        }
        .validate(order)
    }
}

// =============================================================================
// Session
// =============================================================================

/// One cashier's sale in progress.
#[derive(Debug)]
pub struct SalesSession<L> {
    lookup: L,
    organization_id: String,
    orders: OrderController,
    mixed: MixedBuilder,
    cart: Cart,
    ticket: TicketFlow,
}

impl<L> SalesSession<L>
where
    L: PriceLookup + StockLookup + UnitLookup,
{
    pub fn new(lookup: L, organization_id: impl Into<String>) -> Self {
        SalesSession {
            lookup,
            organization_id: organization_id.into(),
            orders: OrderController::new(),
            mixed: MixedBuilder::new(),
            cart: Cart::new(),
            ticket: TicketFlow::new(),
        }
    }

    pub fn with_ticket_numbers(mut self, numbers: Box<dyn TicketNumberSource>) -> Self {
        self.ticket = TicketFlow::with_numbers(numbers);
        self
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Swaps in a fresh catalog (after a realtime change). Committed lines
    /// keep their prices.
    pub fn replace_lookup(&mut self, lookup: L) {
        debug!("Lookup replaced");
        self.lookup = lookup;
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn order(&self) -> &OrderState {
        self.orders.state()
    }

    pub fn orders(&self) -> &OrderController {
        &self.orders
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn ticket(&self) -> &TicketFlow {
        &self.ticket
    }

    pub fn mixed(&self) -> &MixedBuilder {
        &self.mixed
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn select_consumption_mode(&mut self, mode: ConsumptionMode) {
        self.orders.select_consumption_mode(mode);
    }

    /// Also clears the mix.
    pub fn select_emission(&mut self, emission: impl Into<String>) {
        self.orders.select_emission(emission);
        self.mixed.reset();
    }

    pub fn toggle_variety(&mut self) {
        self.orders.toggle_variety();
    }

    pub fn select_beer_type(&mut self, beer_type: impl Into<String>) -> bool {
        self.orders.select_beer_type(beer_type)
    }

    pub fn change_subtype(&mut self, subtype: Subtype) {
        self.orders.change_subtype(subtype);
        self.mixed.reset();
    }

    pub fn toggle_third(&mut self) {
        self.orders.toggle_third();
        self.mixed.reset();
    }

    pub fn increment_quantity(&mut self) {
        self.orders.increment_quantity();
    }

    pub fn decrement_quantity(&mut self) {
        self.orders.decrement_quantity();
    }

    pub fn set_quantity_text(&mut self, text: &str) {
        self.orders.set_quantity_text(text);
    }

    pub fn toggle_section(&mut self, section: OrderSection) {
        self.orders.toggle_section(section);
    }

    pub fn close_mixed_overlay(&mut self) {
        self.orders.close_mixed_overlay();
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Commits the current selection with cart-aware stock validation.
    pub fn add_to_cart(&mut self) -> CoreResult<Option<CartItem>> {
        let validator = CartAwareStock(&self.lookup);
        self.cart.add_to_cart(&mut self.orders, &validator, &self.lookup)
    }

    pub fn remove_item(&mut self, id: &str) -> bool {
        self.cart.remove_item(id)
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    // =========================================================================
    // Mixed Builder
    // =========================================================================

    /// Units the mixed case must hold for the current selection.
    pub fn mixed_target(&self) -> u32 {
        let state = self.orders.state();
        self.mixed
            .target(state.emission.as_deref(), state.subtype, Some(&self.lookup))
    }

    pub fn mixed_validation(&self) -> MixedValidation {
        self.mixed.validation(self.mixed_target())
    }

    fn mixed_price_mode(&self) -> PriceMode {
        self.orders
            .state()
            .consumption_mode
            .map(|m| m.price_mode())
            .unwrap_or(PriceMode::Standard)
    }

    pub fn mixed_price_preview(&self) -> MixedPrice {
        let state = self.orders.state();
        let emission = state.emission.as_deref().unwrap_or_default();
        self.mixed
            .price_preview(&self.lookup, emission, state.subtype, self.mixed_price_mode())
    }

    /// Adds one unit of `product` to the mix.
    pub fn add_to_mix(&mut self, product: &str) -> bool {
        let target = self.mixed_target();
        let subtype = self.orders.state().subtype;
        let stock = ReservedStock {
            lookup: &self.lookup,
            cart: &self.cart,
        };
        self.mixed.add_to_mix(product, subtype, target, &stock)
    }

    pub fn remove_from_mix(&mut self, product: &str) -> bool {
        self.mixed.remove_from_mix(product)
    }

    pub fn reset_mix(&mut self) {
        self.mixed.reset();
    }

    /// Commits the mix as one line once it matches its target exactly.
    ///
    /// ## Errors
    /// - `MixedIncomplete` when the total differs from the target
    pub fn confirm_mix(&mut self) -> CoreResult<CartItem> {
        let validation = self.mixed_validation();
        if !self.orders.state().is_mixed_takeaway()
            || !validation.is_valid
            || validation.target == 0
        {
            return Err(CoreError::MixedIncomplete {
                current: validation.current,
                target: validation.target,
            });
        }

        let price = self.mixed_price_preview();
        let item = self
            .cart
            .add_mixed(self.orders.state(), self.mixed.composition(), price)?;
        self.mixed.reset();
        self.orders.reset();
        info!(
            id = %item.id,
            units = validation.current,
            price = %price.price,
            "Mixed case confirmed"
        );
        Ok(item)
    }

    // =========================================================================
    // Ticket
    // =========================================================================

    pub fn set_customer_name(&mut self, name: &str) -> CoreResult<()> {
        self.ticket.set_customer_name(name)
    }

    pub fn set_payment_method(&mut self, method: Option<PaymentMethod>) {
        self.ticket.set_payment_method(method);
    }

    pub fn set_payment_reference(&mut self, text: &str) {
        self.ticket.set_payment_reference(text);
    }

    pub fn advance(&mut self) -> CoreResult<TicketStep> {
        self.ticket.advance(&self.cart)
    }

    pub fn validate_payment(&self) -> CoreResult<()> {
        self.ticket.validate_payment(&self.cart)
    }

    pub fn button_label(&self) -> &'static str {
        self.ticket.button_label(&self.cart)
    }

    pub fn take_focus_request(&mut self) -> bool {
        self.ticket.take_focus_request()
    }

    /// Produces the ticket and starts a fresh sale.
    pub fn finalize(&mut self) -> CoreResult<Ticket> {
        let ticket = self.ticket.finalize(&self.cart, &self.organization_id)?;
        self.cart.clear();
        self.orders.reset();
        self.mixed.reset();
        info!(number = ticket.number, items = ticket.items.len(), "Sale completed");
        Ok(ticket)
    }

    /// Abandons the sale.
    pub fn cancel(&mut self) {
        self.ticket.reset();
        self.cart.clear();
        self.orders.reset();
        self.mixed.reset();
        info!("Sale cancelled");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
