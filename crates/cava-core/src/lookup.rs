//! # Lookups
//!
//! Capability traits the controllers call into, plus [`Catalog`], an
//! in-memory snapshot that implements all of them.
//!
//! ## Who Provides What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Controller            Needs                     Trait                  │
//! │  ──────────            ─────                     ─────                  │
//! │  MixedBuilder   ─────► "one more unit of X?"  ─► StockLookup            │
//! │                 ─────► "units in a Case?"     ─► UnitLookup             │
//! │                 ─────► "price of X per case"  ─► PriceLookup            │
//! │  Cart           ─────► "is this line in stock"─► StockValidator         │
//! │                                                                         │
//! │  cava-db loads a Catalog from SQLite; tests build one by hand.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::order_state::OrderState;
use crate::types::{PriceMode, Subtype};

/// Emission name for single loose units. Mixed cases count in these.
pub const UNIT_EMISSION: &str = "Unit";

// =============================================================================
// Traits
// =============================================================================

/// Price lookups in both display currencies.
pub trait PriceLookup {
    /// Price in the primary currency for one `emission` of `product`.
    fn price(&self, product: &str, emission: &str, subtype: Subtype, mode: PriceMode) -> Money;

    /// Price in the secondary ("Bs.") currency.
    fn price_bs(&self, product: &str, emission: &str, subtype: Subtype, mode: PriceMode)
        -> Money;
}

/// Stock availability.
pub trait StockLookup {
    /// Whether `quantity` × `emission` of `product` can be taken from stock.
    fn check_stock(&self, product: &str, emission: &str, subtype: Subtype, quantity: u32)
        -> bool;

    /// Units on hand when known. Only used to word error messages.
    fn available_units(&self, _product: &str, _subtype: Subtype) -> Option<i64> {
        None
    }
}

/// Packaging sizes.
pub trait UnitLookup {
    /// How many single units one `emission` holds for `subtype`.
    fn units_per_emission(&self, emission: &str, subtype: Subtype) -> Option<u32>;
}

/// Checks a selection against stock right before it is committed.
pub trait StockValidator {
    fn validate(&self, order: &OrderState, cart: &Cart) -> CoreResult<()>;
}

impl<F> StockValidator for F
where
    F: Fn(&OrderState, &Cart) -> CoreResult<()>,
{
    fn validate(&self, order: &OrderState, cart: &Cart) -> CoreResult<()> {
        self(order, cart)
    }
}

impl<T: PriceLookup + ?Sized> PriceLookup for &T {
    fn price(&self, product: &str, emission: &str, subtype: Subtype, mode: PriceMode) -> Money {
        (**self).price(product, emission, subtype, mode)
    }

    fn price_bs(
        &self,
        product: &str,
        emission: &str,
        subtype: Subtype,
        mode: PriceMode,
    ) -> Money {
        (**self).price_bs(product, emission, subtype, mode)
    }
}

impl<T: StockLookup + ?Sized> StockLookup for &T {
    fn check_stock(&self, product: &str, emission: &str, subtype: Subtype, quantity: u32) -> bool {
        (**self).check_stock(product, emission, subtype, quantity)
    }

    fn available_units(&self, product: &str, subtype: Subtype) -> Option<i64> {
        (**self).available_units(product, subtype)
    }
}

impl<T: UnitLookup + ?Sized> UnitLookup for &T {
    fn units_per_emission(&self, emission: &str, subtype: Subtype) -> Option<u32> {
        (**self).units_per_emission(emission, subtype)
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PriceKey {
    product: String,
    emission: String,
    subtype: Subtype,
    local: bool,
}

/// Prices of one (product, emission, subtype, locality) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceEntry {
    pub price: Money,
    pub price_bs: Money,
}

/// In-memory catalog snapshot.
///
/// ## Stock Semantics
/// Stock is kept in single units per (product, subtype). A product with no
/// stock row is not tracked and always passes the stock check.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    prices: HashMap<PriceKey, PriceEntry>,
    stock: HashMap<(String, Subtype), i64>,
    emissions: BTreeMap<(Subtype, String), u32>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Registers the prices of one combination, replacing any previous entry.
    pub fn set_price(
        &mut self,
        product: impl Into<String>,
        emission: impl Into<String>,
        subtype: Subtype,
        mode: PriceMode,
        price: Money,
        price_bs: Money,
    ) -> &mut Self {
        let key = PriceKey {
            product: product.into(),
            emission: emission.into(),
            subtype,
            local: mode.is_local(),
        };
        self.prices.insert(key, PriceEntry { price, price_bs });
        self
    }

    /// Sets the units on hand for a product/subtype.
    pub fn set_stock(
        &mut self,
        product: impl Into<String>,
        subtype: Subtype,
        units: i64,
    ) -> &mut Self {
        self.stock.insert((product.into(), subtype), units);
        self
    }

    /// Declares how many units an emission holds for a subtype.
    pub fn set_emission(
        &mut self,
        emission: impl Into<String>,
        subtype: Subtype,
        units: u32,
    ) -> &mut Self {
        self.emissions.insert((subtype, emission.into()), units);
        self
    }

    /// Exact price entry, if configured.
    pub fn find_price(
        &self,
        product: &str,
        emission: &str,
        subtype: Subtype,
        mode: PriceMode,
    ) -> Option<PriceEntry> {
        let key = PriceKey {
            product: product.to_string(),
            emission: emission.to_string(),
            subtype,
            local: mode.is_local(),
        };
        self.prices.get(&key).copied()
    }

    /// Units on hand, `None` when the product is not tracked.
    pub fn available_units(&self, product: &str, subtype: Subtype) -> Option<i64> {
        self.stock.get(&(product.to_string(), subtype)).copied()
    }

    /// Emissions offered for a subtype with their sizes, ordered by name.
    pub fn emissions_for(&self, subtype: Subtype) -> Vec<(String, u32)> {
        self.emissions
            .iter()
            .filter(|((s, _), _)| *s == subtype)
            .map(|((_, e), units)| (e.clone(), *units))
            .collect()
    }

    /// Products with at least one price for the subtype, sorted.
    pub fn products_for(&self, subtype: Subtype) -> Vec<String> {
        let mut products: Vec<String> = self
            .prices
            .keys()
            .filter(|k| k.subtype == subtype)
            .map(|k| k.product.clone())
            .collect();
        products.sort();
        products.dedup();
        products
    }

    /// Units needed to fill `quantity` × `emission`.
    pub fn units_required(&self, emission: &str, subtype: Subtype, quantity: u32) -> i64 {
        let per = self.units_per_emission(emission, subtype).unwrap_or(1);
        i64::from(per) * i64::from(quantity)
    }

    /// Fails with `InsufficientStock` unless `extra_units` more units of the
    /// product can be taken, on top of `reserved` already promised.
    pub fn ensure_units(
        &self,
        product: &str,
        subtype: Subtype,
        reserved: i64,
        extra_units: i64,
    ) -> CoreResult<()> {
        match self.available_units(product, subtype) {
            Some(available) if reserved + extra_units > available => {
                Err(CoreError::InsufficientStock {
                    product: product.to_string(),
                    available: (available - reserved).max(0),
                    requested: extra_units,
                })
            }
            _ => Ok(()),
        }
    }
}

impl PriceLookup for Catalog {
    fn price(&self, product: &str, emission: &str, subtype: Subtype, mode: PriceMode) -> Money {
        self.find_price(product, emission, subtype, mode)
            .map(|e| e.price)
            .unwrap_or_default()
    }

    fn price_bs(
        &self,
        product: &str,
        emission: &str,
        subtype: Subtype,
        mode: PriceMode,
    ) -> Money {
        self.find_price(product, emission, subtype, mode)
            .map(|e| e.price_bs)
            .unwrap_or_default()
    }
}

impl StockLookup for Catalog {
    fn check_stock(&self, product: &str, emission: &str, subtype: Subtype, quantity: u32) -> bool {
        let needed = self.units_required(emission, subtype, quantity);
        self.ensure_units(product, subtype, 0, needed).is_ok()
    }

    fn available_units(&self, product: &str, subtype: Subtype) -> Option<i64> {
        Catalog::available_units(self, product, subtype)
    }
}

impl UnitLookup for Catalog {
    fn units_per_emission(&self, emission: &str, subtype: Subtype) -> Option<u32> {
        if emission == UNIT_EMISSION {
            return Some(self.emissions.get(&(subtype, emission.to_string())).copied().unwrap_or(1));
        }
        self.emissions.get(&(subtype, emission.to_string())).copied()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .set_emission("Case", Subtype::Bottle, 36)
            .set_emission("Half-Case", Subtype::Bottle, 18)
            .set_emission("Case", Subtype::Can, 24)
            .set_price(
                "Polar Pilsen",
                "Case",
                Subtype::Bottle,
                PriceMode::Standard,
                Money::from_cents(2400),
                Money::from_cents(96000),
            )
            .set_price(
                "Polar Pilsen",
                "Case",
                Subtype::Bottle,
                PriceMode::Local,
                Money::from_cents(3000),
                Money::from_cents(120000),
            )
            .set_stock("Polar Pilsen", Subtype::Bottle, 40);
        catalog
    }

    #[test]
    fn test_price_lookup_by_mode() {
        let catalog = catalog();
        assert_eq!(
            catalog.price("Polar Pilsen", "Case", Subtype::Bottle, PriceMode::Standard),
            Money::from_cents(2400)
        );
        assert_eq!(
            catalog.price_bs("Polar Pilsen", "Case", Subtype::Bottle, PriceMode::Local),
            Money::from_cents(120000)
        );
        assert!(catalog
            .price("Polar Pilsen", "Case", Subtype::Can, PriceMode::Local)
            .is_zero());
    }

    #[test]
    fn test_units_per_emission() {
        let catalog = catalog();
        assert_eq!(catalog.units_per_emission("Case", Subtype::Bottle), Some(36));
        assert_eq!(catalog.units_per_emission("Case", Subtype::Can), Some(24));
        assert_eq!(catalog.units_per_emission("Pallet", Subtype::Can), None);
        assert_eq!(catalog.units_per_emission(UNIT_EMISSION, Subtype::Can), Some(1));
    }

    #[test]
    fn test_check_stock_counts_units() {
        let catalog = catalog();
        assert!(catalog.check_stock("Polar Pilsen", "Case", Subtype::Bottle, 1));
        assert!(!catalog.check_stock("Polar Pilsen", "Case", Subtype::Bottle, 2));
        assert!(catalog.check_stock("Polar Pilsen", UNIT_EMISSION, Subtype::Bottle, 40));
        assert!(!catalog.check_stock("Polar Pilsen", UNIT_EMISSION, Subtype::Bottle, 41));
        // Untracked product
        assert!(catalog.check_stock("Solera Azul", "Case", Subtype::Bottle, 99));
    }

    #[test]
    fn test_ensure_units_reports_remaining() {
        let catalog = catalog();
        let err = catalog
            .ensure_units("Polar Pilsen", Subtype::Bottle, 36, 18)
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product: "Polar Pilsen".to_string(),
                available: 4,
                requested: 18,
            }
        );
    }

    #[test]
    fn test_listing_helpers() {
        let catalog = catalog();
        assert_eq!(
            catalog.emissions_for(Subtype::Bottle),
            vec![("Case".to_string(), 36), ("Half-Case".to_string(), 18)]
        );
        assert_eq!(catalog.products_for(Subtype::Bottle), vec!["Polar Pilsen"]);
        assert!(catalog.products_for(Subtype::Can).is_empty());
    }
}
