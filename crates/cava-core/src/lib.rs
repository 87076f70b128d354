//! # cava-core: Order-Building Logic for Cava POS
//!
//! This crate holds the sale flow of the register as plain state machines
//! with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cava POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    View layer (any frontend)                    │   │
//! │  │   Selection ──► Mixed builder ──► Cart ──► Payment ──► Ticket   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ intents                                │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cava-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐ ┌─────────────┐ ┌────────┐ ┌─────────────┐    │   │
//! │  │   │ order_state │ │mixed_builder│ │  cart  │ │ ticket_flow │    │   │
//! │  │   └─────────────┘ └─────────────┘ └────────┘ └─────────────┘    │   │
//! │  │          ▲ wired together by session::SalesSession              │   │
//! │  │          │                                                      │   │
//! │  │   lookup traits: PriceLookup, StockLookup, UnitLookup           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cava-db (Database Layer)                     │   │
//! │  │     SQLite repositories, catalog snapshot, realtime changes     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Enumerations (consumption mode, subtype, payment method...)
//! - [`money`] - Integer-cent money type
//! - [`error`] - Domain error types
//! - [`lookup`] - Traits the controllers call into, and the in-memory [`Catalog`]
//! - [`mixed`] - Mixed case helpers (target, validation, max-price rule)
//! - [`order_state`], [`mixed_builder`], [`cart`], [`ticket_flow`] - The controllers
//! - [`session`] - One sale in progress, all controllers wired together
//! - [`formatters`] - Display strings for both currencies
//! - [`license`] - License keys
//! - [`validation`] - Field validators
//!
//! ## Example Usage
//!
//! ```rust
//! use cava_core::{Catalog, ConsumptionMode, Money, PriceMode, SalesSession, Subtype};
//!
//! let mut catalog = Catalog::new();
//! catalog
//!     .set_emission("Case", Subtype::Bottle, 36)
//!     .set_price("Polar Pilsen", "Case", Subtype::Bottle, PriceMode::Standard,
//!                Money::from_cents(2900), Money::from_cents(116_000));
//!
//! let mut session = SalesSession::new(catalog, cava_core::DEFAULT_ORGANIZATION_ID);
//! session.select_consumption_mode(ConsumptionMode::Takeaway);
//! session.select_emission("Case");
//! session.select_beer_type("Polar Pilsen");
//! session.set_quantity_text("2");
//!
//! let item = session.add_to_cart().unwrap().unwrap();
//! assert_eq!(item.line_total(), Money::from_cents(5800));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod formatters;
pub mod license;
pub mod lookup;
pub mod mixed;
pub mod mixed_builder;
pub mod money;
pub mod order_state;
pub mod session;
pub mod ticket_flow;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem, CartTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use license::{License, LicenseKey, LicenseStatus};
pub use lookup::{Catalog, PriceLookup, StockLookup, StockValidator, UnitLookup};
pub use mixed::{MixedComposition, MixedPrice, MixedValidation};
pub use mixed_builder::MixedBuilder;
pub use money::Money;
pub use order_state::{OrderController, OrderSection, OrderState};
pub use session::SalesSession;
pub use ticket_flow::{
    RandomNumbers, SequentialNumbers, Ticket, TicketFlow, TicketNumberSource, TicketStep,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Organization used by single-store installs.
pub const DEFAULT_ORGANIZATION_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum lines in a single ticket.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
pub const MAX_ITEM_QUANTITY: u32 = 999;
