//! # Domain Types
//!
//! Enumerations shared by every controller in the order flow.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ConsumptionMode │   │     Subtype     │   │   BeerVariety   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Local          │   │  Bottle         │   │  Normal         │       │
//! │  │  Takeaway       │   │  BottleThird    │   │  Mixed          │       │
//! │  └────────┬────────┘   │  Can / TallCan  │   └─────────────────┘       │
//! │           │            └─────────────────┘                              │
//! │           ▼                                                             │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    PriceMode    │   │  PaymentMethod  │   │  TicketStatus   │       │
//! │  │  Local/Standard │   │  MobilePayment  │   │  Open / Paid    │       │
//! │  └─────────────────┘   │  needs a ref #  │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Emissions ("Case", "Half-Case", "Unit", ...) and product identifiers are
//! catalog data, so they stay plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Beer type forced by the Bottle-Third shortcut.
pub const THIRD_BEER_TYPE: &str = "Third";

// =============================================================================
// Consumption Mode
// =============================================================================

/// Dine-in vs to-go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionMode {
    /// Consumed on the premises. Tickets may stay open without payment.
    Local,
    /// Taken away. Must be paid when the ticket is created.
    Takeaway,
}

impl ConsumptionMode {
    /// Price list used for this mode.
    pub const fn price_mode(&self) -> PriceMode {
        match self {
            ConsumptionMode::Local => PriceMode::Local,
            ConsumptionMode::Takeaway => PriceMode::Standard,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ConsumptionMode::Local => "local",
            ConsumptionMode::Takeaway => "takeaway",
        }
    }
}

impl fmt::Display for ConsumptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Subtype
// =============================================================================

/// Physical packaging variant. Decides which emissions are available.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Subtype {
    #[default]
    Bottle,
    /// One-third liter bottle, sold as its own beer type ("Third").
    BottleThird,
    Can,
    TallCan,
}

impl Subtype {
    pub const ALL: [Subtype; 4] = [
        Subtype::Bottle,
        Subtype::BottleThird,
        Subtype::Can,
        Subtype::TallCan,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Subtype::Bottle => "bottle",
            Subtype::BottleThird => "bottle_third",
            Subtype::Can => "can",
            Subtype::TallCan => "tall_can",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subtype {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "bottle" => Ok(Subtype::Bottle),
            "bottle_third" | "third" => Ok(Subtype::BottleThird),
            "can" => Ok(Subtype::Can),
            "tall_can" => Ok(Subtype::TallCan),
            _ => Err(ValidationError::NotAllowed {
                field: "subtype".to_string(),
                allowed: Subtype::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Beer Variety
// =============================================================================

/// Whether a line is a single product or a mixed case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BeerVariety {
    #[default]
    Normal,
    Mixed,
}

impl BeerVariety {
    /// The other variety.
    pub const fn toggled(&self) -> Self {
        match self {
            BeerVariety::Normal => BeerVariety::Mixed,
            BeerVariety::Mixed => BeerVariety::Normal,
        }
    }
}

// =============================================================================
// Price Mode
// =============================================================================

/// Which price list a lookup reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PriceMode {
    Local,
    Standard,
}

impl PriceMode {
    pub const fn is_local(&self) -> bool {
        matches!(self, PriceMode::Local)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Local currency cash.
    Cash,
    /// Debit/credit card on the external terminal.
    Card,
    /// Bank-to-bank mobile payment. Needs the confirmation number.
    MobilePayment,
    /// Foreign currency cash.
    ForeignCash,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::MobilePayment,
        PaymentMethod::ForeignCash,
    ];

    /// Whether the cashier must type a reference number.
    pub const fn requires_reference(&self) -> bool {
        matches!(self, PaymentMethod::MobilePayment)
    }

    /// Label shown on the payment selector.
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::MobilePayment => "Mobile Payment",
            PaymentMethod::ForeignCash => "Foreign Cash",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    /// Accepts either the label or the snake_case name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.label().to_lowercase().replace(' ', "_") == normalized)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.label().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Ticket Status
// =============================================================================

/// Status of a finalized ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Dine-in ticket opened without payment.
    #[default]
    Open,
    /// Paid at creation.
    Paid,
}

// =============================================================================
// Change Kind
// =============================================================================

/// Kind of row change carried by a realtime notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_mode_follows_consumption() {
        assert_eq!(ConsumptionMode::Local.price_mode(), PriceMode::Local);
        assert_eq!(ConsumptionMode::Takeaway.price_mode(), PriceMode::Standard);
    }

    #[test]
    fn test_subtype_default_and_parse() {
        assert_eq!(Subtype::default(), Subtype::Bottle);
        assert_eq!("Bottle-Third".parse::<Subtype>().unwrap(), Subtype::BottleThird);
        assert_eq!("tall can".parse::<Subtype>().unwrap(), Subtype::TallCan);
        assert!("keg".parse::<Subtype>().is_err());
    }

    #[test]
    fn test_variety_toggle() {
        assert_eq!(BeerVariety::Normal.toggled(), BeerVariety::Mixed);
        assert_eq!(BeerVariety::Mixed.toggled(), BeerVariety::Normal);
    }

    #[test]
    fn test_only_mobile_payment_requires_reference() {
        for method in PaymentMethod::ALL {
            assert_eq!(
                method.requires_reference(),
                method == PaymentMethod::MobilePayment
            );
        }
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(
            "Mobile Payment".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::MobilePayment
        );
        assert_eq!(
            "foreign_cash".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::ForeignCash
        );
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_change_kind_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Insert).unwrap(),
            "\"INSERT\""
        );
    }
}
