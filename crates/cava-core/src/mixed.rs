//! # Mixed Case Helpers
//!
//! Pure functions behind the mixed-case builder.
//!
//! ## Filling a Case
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Emission "Case", Subtype Bottle ──► UnitLookup ──► target = 24         │
//! │                                                                         │
//! │  Composition { Polar Pilsen: 10, Solera: 10 }                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_mixed_composition ──► current 20, missing 4, is_valid false   │
//! │                                                                         │
//! │  + Zulia ×4  ──► current 24 ──► is_valid true ──► can be committed      │
//! │                                                                         │
//! │  Price of the case = MAX(price of each product in the composition)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Max-Price Rule
//! A mixed case is charged at the unit price of its most expensive
//! constituent. Not an average, not a sum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::lookup::{PriceLookup, UnitLookup};
use crate::money::Money;
use crate::types::{PriceMode, Subtype};

// =============================================================================
// Composition
// =============================================================================

/// Product id → number of units in the mix.
///
/// ## Invariant
/// Every stored count is > 0. Removing the last unit removes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MixedComposition(BTreeMap<String, u32>);

impl MixedComposition {
    pub fn new() -> Self {
        MixedComposition::default()
    }

    /// Builds a composition from counts, dropping zero entries.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        MixedComposition(
            counts
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(product, count)| (product.into(), count))
                .collect(),
        )
    }

    /// Units of `product` in the mix (0 when absent).
    pub fn count(&self, product: &str) -> u32 {
        self.0.get(product).copied().unwrap_or(0)
    }

    pub fn total_units(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct products.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.0.iter()
    }

    pub fn products(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub(crate) fn increment(&mut self, product: &str) {
        *self.0.entry(product.to_string()).or_insert(0) += 1;
    }

    /// Removes one unit. Returns false when the product was not in the mix.
    pub(crate) fn decrement(&mut self, product: &str) -> bool {
        match self.0.get_mut(product) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.0.remove(product);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// Total units in a composition.
pub fn sum_composition(composition: &MixedComposition) -> u32 {
    composition.total_units()
}

// =============================================================================
// Target Units
// =============================================================================

/// Units a mixed case must hold.
///
/// - no emission chosen → 0
/// - no lookup available → 1
/// - otherwise the lookup's size for (emission, subtype), 1 if unknown
pub fn target_units(
    emission: Option<&str>,
    subtype: Subtype,
    lookup: Option<&dyn UnitLookup>,
) -> u32 {
    let Some(emission) = emission else {
        return 0;
    };
    match lookup {
        Some(lookup) => lookup.units_per_emission(emission, subtype).unwrap_or(1),
        None => 1,
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Completeness of a composition against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MixedValidation {
    pub is_valid: bool,
    pub current: u32,
    pub target: u32,
    /// Units still needed (0 at or over target).
    pub missing: u32,
    /// Units over the target (0 at or under target).
    pub excess: u32,
}

pub fn validate_mixed_composition(composition: &MixedComposition, target: u32) -> MixedValidation {
    let current = composition.total_units();
    MixedValidation {
        is_valid: current == target,
        current,
        target,
        missing: target.saturating_sub(current),
        excess: current.saturating_sub(target),
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Unit prices of a mixed case in both currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MixedPrice {
    pub price: Money,
    pub price_bs: Money,
}

/// Max-price rule: each currency takes the highest price among the products
/// in the composition. Empty composition → zero.
pub fn mixed_unit_price(
    composition: &MixedComposition,
    prices: &dyn PriceLookup,
    emission: &str,
    subtype: Subtype,
    mode: PriceMode,
) -> MixedPrice {
    composition
        .products()
        .fold(MixedPrice::default(), |acc, product| MixedPrice {
            price: acc.price.max(prices.price(product, emission, subtype, mode)),
            price_bs: acc
                .price_bs
                .max(prices.price_bs(product, emission, subtype, mode)),
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::Catalog;

    fn case_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.set_emission("Case", Subtype::Bottle, 24);
        for (product, cents, bs) in [
            ("A", 2000, 80_000),
            ("B", 2600, 90_000),
            ("C", 2300, 99_000),
        ] {
            catalog.set_price(
                product,
                "Case",
                Subtype::Bottle,
                PriceMode::Standard,
                Money::from_cents(cents),
                Money::from_cents(bs),
            );
        }
        catalog
    }

    #[test]
    fn test_from_counts_drops_zero() {
        let comp = MixedComposition::from_counts([("A", 3), ("B", 0)]);
        assert_eq!(comp.len(), 1);
        assert_eq!(comp.count("B"), 0);
        assert_eq!(sum_composition(&comp), 3);
    }

    #[test]
    fn test_decrement_removes_key_at_zero() {
        let mut comp = MixedComposition::from_counts([("A", 2)]);
        assert!(comp.decrement("A"));
        assert_eq!(comp.count("A"), 1);
        assert!(comp.decrement("A"));
        assert!(comp.is_empty());
        assert!(!comp.decrement("A"));
        assert!(comp.iter().all(|(_, c)| *c > 0));
    }

    #[test]
    fn test_target_units() {
        let catalog = case_catalog();
        assert_eq!(target_units(None, Subtype::Bottle, Some(&catalog)), 0);
        assert_eq!(target_units(None, Subtype::Bottle, None), 0);
        assert_eq!(target_units(Some("Case"), Subtype::Bottle, None), 1);
        assert_eq!(target_units(Some("Case"), Subtype::Bottle, Some(&catalog)), 24);
        assert_eq!(target_units(Some("Crate"), Subtype::Bottle, Some(&catalog)), 1);
    }

    #[test]
    fn test_validation_under_target() {
        let comp = MixedComposition::from_counts([("A", 10), ("B", 10)]);
        let v = validate_mixed_composition(&comp, 24);
        assert_eq!(
            v,
            MixedValidation {
                is_valid: false,
                current: 20,
                target: 24,
                missing: 4,
                excess: 0,
            }
        );
        assert_eq!(v.missing + v.current, v.target);
    }

    #[test]
    fn test_validation_at_and_over_target() {
        let exact = MixedComposition::from_counts([("A", 10), ("B", 10), ("C", 4)]);
        let v = validate_mixed_composition(&exact, 24);
        assert!(v.is_valid);
        assert_eq!((v.missing, v.excess), (0, 0));

        let over = MixedComposition::from_counts([("A", 20), ("B", 7)]);
        let v = validate_mixed_composition(&over, 24);
        assert!(!v.is_valid);
        assert_eq!(v.excess, v.current - v.target);
        assert_eq!(v.missing, 0);
    }

    #[test]
    fn test_mixed_price_takes_max_per_currency() {
        let catalog = case_catalog();
        let comp = MixedComposition::from_counts([("A", 12), ("B", 6), ("C", 6)]);
        let price = mixed_unit_price(&comp, &catalog, "Case", Subtype::Bottle, PriceMode::Standard);

        // B is the most expensive in "$", C in "Bs."
        assert_eq!(price.price, Money::from_cents(2600));
        assert_eq!(price.price_bs, Money::from_cents(99_000));
        // Not an average, not a sum
        assert_ne!(price.price, Money::from_cents((2000 + 2600 + 2300) / 3));
    }

    #[test]
    fn test_mixed_price_of_empty_composition_is_zero() {
        let catalog = case_catalog();
        let price = mixed_unit_price(
            &MixedComposition::new(),
            &catalog,
            "Case",
            Subtype::Bottle,
            PriceMode::Standard,
        );
        assert_eq!(price, MixedPrice::default());
    }
}
