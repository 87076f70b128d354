//! # Validation Module
//!
//! Field validators for data entering the store or the ticket.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Controllers                                                   │
//! │  ├── Quantity clamped, reference kept to digits                         │
//! │  └── Never an error, invalid input is ignored                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Catalog rows written by the seed / admin tools                     │
//! │  └── Ticket fields before the order is persisted                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  └── UNIQUE keys used by the upserts                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cava_core::validation::{validate_product_id, validate_quantity};
//!
//! validate_product_id("Polar Pilsen").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::PaymentMethod;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_PRODUCT_ID_LEN: usize = 80;
pub const MAX_CUSTOMER_NAME_LEN: usize = 120;
const MAX_REFERENCE_LEN: usize = 20;

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product identifier ("Polar Pilsen", "Solera Light").
///
/// ## Rules
/// - Must not be blank
/// - At most 80 characters
/// - Cannot be the reserved "Mixed" prefix used for mixed lines
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(required("product"));
    }
    if id.chars().count() > MAX_PRODUCT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "product".to_string(),
            max: MAX_PRODUCT_ID_LEN,
        });
    }
    if id.starts_with("Mixed") {
        return Err(ValidationError::InvalidFormat {
            field: "product".to_string(),
            reason: "\"Mixed\" is reserved for mixed lines".to_string(),
        });
    }

    Ok(())
}

/// Validates an emission name ("Case", "Half-Case", "Unit").
pub fn validate_emission(emission: &str) -> ValidationResult<()> {
    let emission = emission.trim();
    if emission.is_empty() {
        return Err(required("emission"));
    }
    if emission.chars().count() > MAX_PRODUCT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "emission".to_string(),
            max: MAX_PRODUCT_ID_LEN,
        });
    }
    Ok(())
}

/// Validates the payment reference for a method.
///
/// ## Rules
/// - Methods that need a reference: required, digits only, at most 20
/// - Other methods: anything goes (it is not stored)
///
/// ```rust
/// use cava_core::validation::validate_payment_reference;
/// use cava_core::PaymentMethod;
///
/// assert!(validate_payment_reference(PaymentMethod::MobilePayment, "004512").is_ok());
/// assert!(validate_payment_reference(PaymentMethod::MobilePayment, "").is_err());
/// assert!(validate_payment_reference(PaymentMethod::Cash, "").is_ok());
/// ```
pub fn validate_payment_reference(method: PaymentMethod, reference: &str) -> ValidationResult<()> {
    if !method.requires_reference() {
        return Ok(());
    }
    let reference = reference.trim();

    if reference.is_empty() {
        return Err(required("payment reference"));
    }
    if reference.len() > MAX_REFERENCE_LEN {
        return Err(ValidationError::TooLong {
            field: "payment reference".to_string(),
            max: MAX_REFERENCE_LEN,
        });
    }
    if !reference.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "payment reference".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional customer name.
///
/// Blank is fine; returns the trimmed name or `None`.
pub fn validate_customer_name(name: &str) -> ValidationResult<Option<String>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if name.chars().count() > MAX_CUSTOMER_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "customer name".to_string(),
            max: MAX_CUSTOMER_NAME_LEN,
        });
    }
    Ok(Some(name.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 || qty > i64::from(MAX_ITEM_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: i64::from(MAX_ITEM_QUANTITY),
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (not yet priced)
///
/// ## Example
/// ```rust
/// use cava_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(2900).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the number of lines in a cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an organization id (UUID).
///
/// ## Example
/// ```rust
/// use cava_core::validation::validate_organization_id;
///
/// assert!(validate_organization_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_organization_id("not-a-uuid").is_err());
/// ```
pub fn validate_organization_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(required("organization"));
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: "organization".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_id() {
        assert!(validate_product_id("Polar Pilsen").is_ok());
        assert!(validate_product_id("Third").is_ok());

        assert!(validate_product_id("").is_err());
        assert!(validate_product_id("   ").is_err());
        assert!(validate_product_id("Mixed (Polar Pilsen)").is_err());
        assert!(validate_product_id(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_emission() {
        assert!(validate_emission("Half-Case").is_ok());
        assert!(validate_emission(" ").is_err());
    }

    #[test]
    fn test_validate_payment_reference() {
        use PaymentMethod::*;
        assert!(validate_payment_reference(MobilePayment, "123456").is_ok());
        assert!(validate_payment_reference(MobilePayment, "  ").is_err());
        assert!(validate_payment_reference(MobilePayment, "12a4").is_err());
        assert!(validate_payment_reference(MobilePayment, &"1".repeat(21)).is_err());
        assert!(validate_payment_reference(Card, "").is_ok());
        assert!(validate_payment_reference(ForeignCash, "x").is_ok());
    }

    #[test]
    fn test_validate_customer_name() {
        assert_eq!(validate_customer_name("  "), Ok(None));
        assert_eq!(validate_customer_name(" Ana "), Ok(Some("Ana".to_string())));
        assert!(validate_customer_name(&"A".repeat(121)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-1).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(MAX_CART_ITEMS).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS + 1).is_err());
    }

    #[test]
    fn test_validate_organization_id() {
        assert!(validate_organization_id(crate::DEFAULT_ORGANIZATION_ID).is_ok());
        assert!(validate_organization_id("").is_err());
        assert!(validate_organization_id("123").is_err());
    }
}
