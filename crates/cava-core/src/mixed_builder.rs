//! # Mixed-Builder Controller
//!
//! Owns the composition of the mixed case being assembled.
//!
//! ## Add / Remove Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_to_mix(X)                                                          │
//! │     ├── total ≥ target?              → rejected, nothing changes        │
//! │     ├── stock for count(X)+1 units?  → no: rejected, nothing changes    │
//! │     └── count(X) += 1                                                   │
//! │                                                                         │
//! │  remove_from_mix(X)                                                     │
//! │     ├── X not in mix?                → rejected, nothing changes        │
//! │     └── count(X) -= 1 (key removed when it reaches 0)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, warn};

use crate::lookup::{PriceLookup, StockLookup, UnitLookup, UNIT_EMISSION};
use crate::mixed::{
    mixed_unit_price, target_units, validate_mixed_composition, MixedComposition, MixedPrice,
    MixedValidation,
};
use crate::types::{PriceMode, Subtype};

/// Single owner of the in-progress [`MixedComposition`].
#[derive(Debug, Clone, Default)]
pub struct MixedBuilder {
    composition: MixedComposition,
}

impl MixedBuilder {
    pub fn new() -> Self {
        MixedBuilder::default()
    }

    pub fn composition(&self) -> &MixedComposition {
        &self.composition
    }

    /// Target for the current emission/subtype.
    pub fn target(
        &self,
        emission: Option<&str>,
        subtype: Subtype,
        units: Option<&dyn UnitLookup>,
    ) -> u32 {
        target_units(emission, subtype, units)
    }

    /// Adds one unit of `product`. Returns whether the mix changed.
    pub fn add_to_mix(
        &mut self,
        product: &str,
        subtype: Subtype,
        target: u32,
        stock: &dyn StockLookup,
    ) -> bool {
        if self.composition.total_units() >= target {
            debug!(product, target, "Mixed case already full");
            return false;
        }

        let wanted = self.composition.count(product) + 1;
        if !stock.check_stock(product, UNIT_EMISSION, subtype, wanted) {
            warn!(product, %subtype, wanted, "Not enough stock for mixed case");
            return false;
        }

        self.composition.increment(product);
        true
    }

    /// Removes one unit of `product`. Returns whether the mix changed.
    pub fn remove_from_mix(&mut self, product: &str) -> bool {
        self.composition.decrement(product)
    }

    pub fn reset(&mut self) {
        self.composition.clear();
    }

    pub fn validation(&self, target: u32) -> MixedValidation {
        validate_mixed_composition(&self.composition, target)
    }

    /// Live price of the case under the max-price rule.
    pub fn price_preview(
        &self,
        prices: &dyn PriceLookup,
        emission: &str,
        subtype: Subtype,
        mode: PriceMode,
    ) -> MixedPrice {
        mixed_unit_price(&self.composition, prices, emission, subtype, mode)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::Catalog;
    use crate::money::Money;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .set_emission("Case", Subtype::Bottle, 24)
            .set_stock("A", Subtype::Bottle, 100)
            .set_stock("B", Subtype::Bottle, 100)
            .set_stock("C", Subtype::Bottle, 100)
            .set_stock("Scarce", Subtype::Bottle, 2);
        catalog
    }

    fn fill(builder: &mut MixedBuilder, catalog: &Catalog, product: &str, n: u32, target: u32) {
        for _ in 0..n {
            assert!(builder.add_to_mix(product, Subtype::Bottle, target, catalog));
        }
    }

    #[test]
    fn test_case_scenario() {
        let catalog = catalog();
        let mut builder = MixedBuilder::new();
        let target = builder.target(Some("Case"), Subtype::Bottle, Some(&catalog));
        assert_eq!(target, 24);

        fill(&mut builder, &catalog, "A", 10, target);
        fill(&mut builder, &catalog, "B", 10, target);
        let v = builder.validation(target);
        assert_eq!((v.current, v.missing, v.excess, v.is_valid), (20, 4, 0, false));

        fill(&mut builder, &catalog, "C", 4, target);
        let v = builder.validation(target);
        assert_eq!(v.current, 24);
        assert!(v.is_valid);

        let before = builder.composition().clone();
        assert!(!builder.add_to_mix("A", Subtype::Bottle, target, &catalog));
        assert_eq!(builder.composition(), &before);
    }

    #[test]
    fn test_add_rejected_without_stock() {
        let catalog = catalog();
        let mut builder = MixedBuilder::new();
        assert!(builder.add_to_mix("Scarce", Subtype::Bottle, 24, &catalog));
        assert!(builder.add_to_mix("Scarce", Subtype::Bottle, 24, &catalog));
        assert!(!builder.add_to_mix("Scarce", Subtype::Bottle, 24, &catalog));
        assert_eq!(builder.composition().count("Scarce"), 2);
    }

    #[test]
    fn test_add_rejected_with_zero_target() {
        let catalog = catalog();
        let mut builder = MixedBuilder::new();
        let target = builder.target(None, Subtype::Bottle, Some(&catalog));
        assert!(!builder.add_to_mix("A", Subtype::Bottle, target, &catalog));
        assert!(builder.composition().is_empty());
    }

    #[test]
    fn test_remove_never_goes_below_one() {
        let catalog = catalog();
        let mut builder = MixedBuilder::new();
        fill(&mut builder, &catalog, "A", 1, 24);

        assert!(builder.remove_from_mix("A"));
        assert!(builder.composition().is_empty());
        assert!(!builder.remove_from_mix("A"));
        assert!(!builder.remove_from_mix("B"));
    }

    #[test]
    fn test_total_never_exceeds_target() {
        let catalog = catalog();
        let mut builder = MixedBuilder::new();
        for i in 0..50 {
            let product = ["A", "B", "C"][i % 3];
            builder.add_to_mix(product, Subtype::Bottle, 24, &catalog);
            assert!(builder.composition().total_units() <= 24);
        }
        assert_eq!(builder.composition().total_units(), 24);
    }

    #[test]
    fn test_price_preview_and_take() {
        let mut catalog = catalog();
        catalog
            .set_price(
                "A",
                "Case",
                Subtype::Bottle,
                PriceMode::Standard,
                Money::from_cents(2000),
                Money::from_cents(80_000),
            )
            .set_price(
                "B",
                "Case",
                Subtype::Bottle,
                PriceMode::Standard,
                Money::from_cents(2500),
                Money::from_cents(100_000),
            );

        let mut builder = MixedBuilder::new();
        assert!(builder
            .price_preview(&catalog, "Case", Subtype::Bottle, PriceMode::Standard)
            .price
            .is_zero());

        fill(&mut builder, &catalog, "A", 20, 24);
        fill(&mut builder, &catalog, "B", 1, 24);
        let preview = builder.price_preview(&catalog, "Case", Subtype::Bottle, PriceMode::Standard);
        assert_eq!(preview.price, Money::from_cents(2500));
        assert_eq!(builder.composition().total_units(), 21);
    }

    #[test]
    fn test_reset() {
        let catalog = catalog();
        let mut builder = MixedBuilder::new();
        fill(&mut builder, &catalog, "A", 3, 24);
        builder.reset();
        assert!(builder.composition().is_empty());
    }
}
