//! # Formatters
//!
//! Pure functions turning amounts and order data into display strings.
//!
//! ## Two Currencies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Primary     $1,234.56        thousands ","   decimal "."               │
//! │  Secondary   Bs. 1.234,56     thousands "."   decimal ","               │
//! │                                                                         │
//! │  Each line carries one amount per currency (both from the price list). │
//! │  No conversion happens here.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, TimeZone};

use crate::cart::CartItem;
use crate::mixed::{MixedComposition, MixedValidation};
use crate::money::Money;
use crate::types::{ConsumptionMode, Subtype};

// =============================================================================
// Currency Formatting
// =============================================================================

/// Rendering rules for one display currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyFormat {
    pub symbol: String,
    /// Put a space between the symbol and the digits.
    pub spaced: bool,
    pub thousands: char,
    pub decimal: char,
}

impl CurrencyFormat {
    /// `$1,234.56`
    pub fn primary() -> Self {
        CurrencyFormat {
            symbol: "$".to_string(),
            spaced: false,
            thousands: ',',
            decimal: '.',
        }
    }

    /// `Bs. 1.234,56`
    pub fn secondary() -> Self {
        CurrencyFormat {
            symbol: "Bs.".to_string(),
            spaced: true,
            thousands: '.',
            decimal: ',',
        }
    }

    /// Same separators, different symbol.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Formats an amount.
    ///
    /// ```rust
    /// use cava_core::formatters::CurrencyFormat;
    /// use cava_core::Money;
    ///
    /// assert_eq!(CurrencyFormat::primary().format(Money::from_cents(123456)), "$1,234.56");
    /// assert_eq!(CurrencyFormat::secondary().format(Money::from_cents(123456)), "Bs. 1.234,56");
    /// ```
    pub fn format(&self, amount: Money) -> String {
        let sign = if amount.is_negative() { "-" } else { "" };
        let space = if self.spaced { " " } else { "" };
        format!(
            "{}{}{}{}{}{:02}",
            sign,
            self.symbol,
            space,
            group_thousands(amount.major().unsigned_abs(), self.thousands),
            self.decimal,
            amount.minor()
        )
    }

    /// Formats a raw decimal. `NaN` and infinities print as zero.
    pub fn format_decimal(&self, amount: f64) -> String {
        self.format(Money::from_decimal(amount))
    }

    /// Parses text produced by [`CurrencyFormat::format`] (symbol optional).
    ///
    /// Returns `None` for anything that is not an amount with at most two
    /// decimals.
    pub fn parse(&self, text: &str) -> Option<Money> {
        let mut rest = text.trim();
        let negative = rest.starts_with('-');
        if negative {
            rest = rest[1..].trim_start();
        }
        rest = rest.strip_prefix(self.symbol.as_str()).unwrap_or(rest).trim();
        if rest.is_empty() {
            return None;
        }

        let (whole, frac) = match rest.split_once(self.decimal) {
            Some((w, f)) => (w, f),
            None => (rest, ""),
        };
        let whole: String = whole.chars().filter(|c| *c != self.thousands).collect();
        if whole.is_empty()
            || frac.len() > 2
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let major: i64 = whole.parse().ok()?;
        let minor: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        let cents = major.checked_mul(100)?.checked_add(minor)?;
        Some(Money::from_cents(if negative { -cents } else { cents }))
    }
}

fn group_thousands(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

// =============================================================================
// Order Labels
// =============================================================================

pub fn consumption_label(mode: Option<ConsumptionMode>) -> &'static str {
    match mode {
        Some(ConsumptionMode::Local) => "Local",
        Some(ConsumptionMode::Takeaway) => "Takeaway",
        None => "Not selected",
    }
}

pub fn subtype_label(subtype: Subtype) -> &'static str {
    match subtype {
        Subtype::Bottle => "Bottle",
        Subtype::BottleThird => "Bottle (1/3)",
        Subtype::Can => "Can",
        Subtype::TallCan => "Tall Can",
    }
}

/// "Mixed (Polar Pilsen)"
pub fn mixed_label(base: &str) -> String {
    format!("Mixed ({})", base)
}

/// "2 × Case", "1 × Half-Case"
pub fn quantity_label(quantity: u32, emission: &str) -> String {
    format!("{} × {}", quantity, emission)
}

/// "Polar Pilsen ×10, Solera ×14", ordered by product.
pub fn composition_summary(composition: &MixedComposition) -> String {
    composition
        .iter()
        .map(|(product, count)| format!("{} ×{}", product, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// "20/24 units (missing 4)"
pub fn mixed_progress_label(validation: &MixedValidation) -> String {
    let base = format!("{}/{} units", validation.current, validation.target);
    if validation.missing > 0 {
        format!("{} (missing {})", base, validation.missing)
    } else if validation.excess > 0 {
        format!("{} ({} too many)", base, validation.excess)
    } else {
        base
    }
}

/// One-line description of a cart item for the ticket summary.
pub fn item_title(item: &CartItem) -> String {
    let emission = item.emission.as_deref().unwrap_or("");
    let beer = item.beer_type.as_deref().unwrap_or("");
    format!(
        "{} {} ({}, {})",
        quantity_label(item.quantity, emission),
        beer,
        subtype_label(item.subtype),
        consumption_label(item.consumption_mode)
    )
}

/// "#0042"
pub fn ticket_number_label(number: u16) -> String {
    format!("#{:04}", number)
}

/// "18/10/2026 07:45 PM"
pub fn format_ticket_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%d/%m/%Y %I:%M %p").to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_primary_format() {
        let usd = CurrencyFormat::primary();
        assert_eq!(usd.format(Money::from_cents(0)), "$0.00");
        assert_eq!(usd.format(Money::from_cents(5)), "$0.05");
        assert_eq!(usd.format(Money::from_cents(100_000_00)), "$100,000.00");
        assert_eq!(usd.format(Money::from_cents(-1_234_56)), "-$1,234.56");
    }

    #[test]
    fn test_secondary_format() {
        let bs = CurrencyFormat::secondary();
        assert_eq!(bs.format(Money::from_cents(1_234_567_89)), "Bs. 1.234.567,89");
        assert_eq!(bs.format(Money::from_cents(99)), "Bs. 0,99");
    }

    #[test]
    fn test_nan_formats_as_zero() {
        assert_eq!(CurrencyFormat::primary().format_decimal(f64::NAN), "$0.00");
        assert_eq!(CurrencyFormat::secondary().format_decimal(f64::NAN), "Bs. 0,00");
        assert_eq!(CurrencyFormat::primary().format_decimal(f64::INFINITY), "$0.00");
    }

    #[test]
    fn test_format_parse_round_trip() {
        for format in [CurrencyFormat::primary(), CurrencyFormat::secondary()] {
            for cents in [0, 1, 10, 99, 100, 1_000, 123_456, 99_999_999, -5_50, -1_000_000_01] {
                let money = Money::from_cents(cents);
                assert_eq!(format.parse(&format.format(money)), Some(money), "{}", cents);
            }
        }
    }

    #[test]
    fn test_decimal_round_trip_two_places() {
        let usd = CurrencyFormat::primary();
        for amount in [0.1, 2.5, 19.99, 1234.56, 0.015] {
            let parsed = usd.parse(&usd.format_decimal(amount)).unwrap();
            assert!((parsed.as_decimal() - amount).abs() <= 0.005 + f64::EPSILON);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let usd = CurrencyFormat::primary();
        assert_eq!(usd.parse(""), None);
        assert_eq!(usd.parse("$"), None);
        assert_eq!(usd.parse("abc"), None);
        assert_eq!(usd.parse("1.234"), None);
        assert_eq!(usd.parse("12.5"), Some(Money::from_cents(1250)));
        assert_eq!(usd.parse("7"), Some(Money::from_cents(700)));
    }

    #[test]
    fn test_labels() {
        assert_eq!(mixed_label("Polar Pilsen"), "Mixed (Polar Pilsen)");
        assert_eq!(quantity_label(2, "Case"), "2 × Case");
        assert_eq!(consumption_label(None), "Not selected");
        assert_eq!(subtype_label(Subtype::BottleThird), "Bottle (1/3)");
        assert_eq!(ticket_number_label(42), "#0042");
    }

    #[test]
    fn test_item_title_and_composition_summary() {
        let composition = MixedComposition::from_counts([("Solera", 14), ("Polar Pilsen", 10)]);
        assert_eq!(composition_summary(&composition), "Polar Pilsen ×10, Solera ×14");
        assert_eq!(composition_summary(&MixedComposition::default()), "");

        let item = CartItem {
            id: "line-1".to_string(),
            consumption_mode: Some(ConsumptionMode::Takeaway),
            emission: Some("Case".to_string()),
            subtype: Subtype::Can,
            variety: crate::types::BeerVariety::Mixed,
            beer_type: Some("Mixed".to_string()),
            quantity: 1,
            display_base: None,
            composition: Some(composition),
            unit_price: Money::from_cents(2800),
            unit_price_bs: Money::from_cents(112_000),
        };
        assert_eq!(item_title(&item), "1 × Case Mixed (Can, Takeaway)");
    }

    #[test]
    fn test_progress_label() {
        let under = MixedValidation {
            is_valid: false,
            current: 20,
            target: 24,
            missing: 4,
            excess: 0,
        };
        assert_eq!(mixed_progress_label(&under), "20/24 units (missing 4)");

        let exact = MixedValidation {
            is_valid: true,
            current: 24,
            target: 24,
            missing: 0,
            excess: 0,
        };
        assert_eq!(mixed_progress_label(&exact), "24/24 units");
    }

    #[test]
    fn test_ticket_date_format() {
        let tz = FixedOffset::west_opt(4 * 3600).unwrap();
        let date = tz.with_ymd_and_hms(2026, 10, 18, 19, 45, 0).unwrap();
        assert_eq!(format_ticket_date(&date), "18/10/2026 07:45 PM");
    }
}
