//! # Error Types
//!
//! Domain-specific error types for cava-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cava-core errors (this file)                                          │
//! │  ├── CoreError        - Rejections the cashier must see                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cava-db errors (separate crate)                                       │
//! │  └── DbError          - Database / activation failures                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → user-facing message     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What Is NOT an Error
//! An incomplete selection, a mixed-case addition past the target or a
//! removal of a product that is not in the mix are silent no-ops. The view
//! never offers those actions, so they return `None`/`false` instead.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Not enough units in stock for the requested line.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (2 × Case of Polar Pilsen = 48 units)
    ///      │
    ///      ▼
    /// Stock validator: 30 units available
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Polar Pilsen", available: 30, requested: 48 }
    ///      │
    ///      ▼
    /// UI shows the message, cart unchanged
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payment data blocks the ticket from advancing.
    #[error("{0}")]
    PaymentValidation(String),

    /// The ticket flow cannot perform the operation in its current step.
    #[error("Ticket is in step {current}, expected {expected}")]
    InvalidStep { current: String, expected: String },

    /// `advance` was called in Payment; the ticket can only be finalized.
    #[error("Ticket is already in {current}, the last step")]
    NoNextStep { current: String },

    /// Operation needs at least one item in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Mixed case does not match its target unit count.
    #[error("Mixed case incomplete: {current} of {target} units")]
    MixedIncomplete { current: u32, target: u32 },

    /// License key rejected before reaching the store.
    #[error("Invalid license: {0}")]
    InvalidLicense(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
