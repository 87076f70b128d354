//! # Ticket-Flow Controller
//!
//! Checkout-step progression and payment fields.
//!
//! ## Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Editing ──advance──► Confirming ──advance──► Payment                  │
//! │      ▲                                            │                     │
//! │      │                                            │ number + date       │
//! │      │                                            │ assigned once       │
//! │      │                                            ▼                     │
//! │      └──────────── reset ◄──── finalize(cart) ──► Ticket                │
//! │                                                                         │
//! │   advance on an empty cart: rejected                                    │
//! │   Payment is terminal until finalize or reset                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Rules
//! Only checked in Payment, and only when at least one cart line is
//! Takeaway. Dine-in tickets may be opened without payment.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::{Cart, CartItem};
use crate::error::{CoreError, CoreResult};
use crate::formatters::format_ticket_date;
use crate::money::Money;
use crate::types::{PaymentMethod, TicketStatus};
use crate::validation::validate_customer_name;

/// Highest ticket number (4 digits).
pub const MAX_TICKET_NUMBER: u16 = 9999;

// =============================================================================
// Ticket Step
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TicketStep {
    #[default]
    Editing,
    Confirming,
    Payment,
}

impl TicketStep {
    fn next(self) -> Option<TicketStep> {
        match self {
            TicketStep::Editing => Some(TicketStep::Confirming),
            TicketStep::Confirming => Some(TicketStep::Payment),
            TicketStep::Payment => None,
        }
    }
}

impl fmt::Display for TicketStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketStep::Editing => "editing",
            TicketStep::Confirming => "confirming",
            TicketStep::Payment => "payment",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Ticket Number Sources
// =============================================================================

/// Where ticket numbers come from.
pub trait TicketNumberSource: fmt::Debug + Send {
    /// Next number in `1..=MAX_TICKET_NUMBER`.
    fn next_number(&mut self) -> u16;
}

/// Monotonic counter, wraps back to 1 after 9999.
#[derive(Debug, Clone)]
pub struct SequentialNumbers {
    next: u16,
}

impl SequentialNumbers {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Resumes after the last number persisted by the store.
    pub fn starting_at(next: u16) -> Self {
        SequentialNumbers {
            next: next.clamp(1, MAX_TICKET_NUMBER),
        }
    }
}

impl Default for SequentialNumbers {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketNumberSource for SequentialNumbers {
    fn next_number(&mut self) -> u16 {
        let number = self.next;
        self.next = if number >= MAX_TICKET_NUMBER { 1 } else { number + 1 };
        number
    }
}

/// Random 4-digit numbers. Collisions are possible and not prevented.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomNumbers;

impl TicketNumberSource for RandomNumbers {
    fn next_number(&mut self) -> u16 {
        rand::thread_rng().gen_range(1000..=MAX_TICKET_NUMBER)
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// A finalized sale document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub organization_id: String,
    pub number: u16,
    /// Local timestamp as shown on the ticket.
    pub date: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub status: TicketStatus,
    pub items: Vec<CartItem>,
    pub total: Money,
    pub total_bs: Money,
}

impl Ticket {
    pub fn is_paid(&self) -> bool {
        self.status == TicketStatus::Paid
    }
}

// =============================================================================
// Ticket Flow
// =============================================================================

/// Single owner of the checkout step and payment fields.
#[derive(Debug)]
pub struct TicketFlow {
    step: TicketStep,
    customer_name: String,
    payment_method: Option<PaymentMethod>,
    payment_reference: String,
    ticket_number: Option<u16>,
    ticket_date: Option<String>,
    focus_requested: bool,
    numbers: Box<dyn TicketNumberSource>,
}

impl Default for TicketFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketFlow {
    /// Flow with sequential ticket numbers.
    pub fn new() -> Self {
        Self::with_numbers(Box::new(SequentialNumbers::new()))
    }

    pub fn with_numbers(numbers: Box<dyn TicketNumberSource>) -> Self {
        TicketFlow {
            step: TicketStep::Editing,
            customer_name: String::new(),
            payment_method: None,
            payment_reference: String::new(),
            ticket_number: None,
            ticket_date: None,
            focus_requested: false,
            numbers,
        }
    }

    pub fn step(&self) -> TicketStep {
        self.step
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn payment_reference(&self) -> &str {
        &self.payment_reference
    }

    pub fn ticket_number(&self) -> Option<u16> {
        self.ticket_number
    }

    pub fn ticket_date(&self) -> Option<&str> {
        self.ticket_date.as_deref()
    }

    /// Stores the trimmed name; blank clears it.
    ///
    /// ## Errors
    /// - `Validation(TooLong)` past the customer name limit (name unchanged)
    pub fn set_customer_name(&mut self, name: &str) -> CoreResult<()> {
        self.customer_name = validate_customer_name(name)?.unwrap_or_default();
        Ok(())
    }

    pub fn set_payment_method(&mut self, method: Option<PaymentMethod>) {
        self.payment_method = method;
        if self.step == TicketStep::Payment && method.is_some_and(|m| m.requires_reference()) {
            self.focus_requested = true;
        }
    }

    /// Keeps the ASCII digits of `text`.
    pub fn set_payment_reference(&mut self, text: &str) {
        self.payment_reference = text.chars().filter(char::is_ascii_digit).collect();
    }

    /// Moves one step forward.
    ///
    /// ## Errors
    /// - `EmptyCart` when the cart has no items
    /// - `NoNextStep` when already in Payment
    pub fn advance(&mut self, cart: &Cart) -> CoreResult<TicketStep> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        let next = self.step.next().ok_or_else(|| CoreError::NoNextStep {
            current: self.step.to_string(),
        })?;

        self.step = next;
        if next == TicketStep::Payment {
            self.enter_payment();
        }
        debug!(step = %next, "Ticket advanced");
        Ok(next)
    }

    fn enter_payment(&mut self) {
        if self.ticket_number.is_none() {
            self.ticket_number = Some(self.numbers.next_number());
            self.ticket_date = Some(format_ticket_date(&Local::now()));
        }
        if self.payment_method.is_some_and(|m| m.requires_reference()) {
            self.focus_requested = true;
        }
    }

    /// Returns true once after a request to bring the reference input into
    /// view.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    /// Whether the payment fields allow finishing the ticket.
    pub fn validate_payment(&self, cart: &Cart) -> CoreResult<()> {
        if self.step != TicketStep::Payment || !cart.has_takeaway() {
            return Ok(());
        }
        let method = self
            .payment_method
            .ok_or_else(|| CoreError::PaymentValidation("Select a payment method".to_string()))?;
        if method.requires_reference() && self.payment_reference.trim().is_empty() {
            return Err(CoreError::PaymentValidation(format!(
                "Enter the {} reference number",
                method.label()
            )));
        }
        Ok(())
    }

    pub fn button_label(&self, cart: &Cart) -> &'static str {
        match self.step {
            TicketStep::Editing | TicketStep::Confirming => "Continue",
            TicketStep::Payment if cart.has_takeaway() => "Pay & Create",
            TicketStep::Payment => "Open Ticket",
        }
    }

    /// Builds the ticket from the cart and resets the flow.
    ///
    /// The cart itself is left untouched; clearing it is up to the caller.
    pub fn finalize(&mut self, cart: &Cart, organization_id: &str) -> CoreResult<Ticket> {
        if self.step != TicketStep::Payment {
            return Err(CoreError::InvalidStep {
                current: self.step.to_string(),
                expected: TicketStep::Payment.to_string(),
            });
        }
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        self.validate_payment(cart)?;

        let paid = cart.has_takeaway();
        let totals = cart.totals();
        let number = match self.ticket_number {
            Some(n) => n,
            None => self.numbers.next_number(),
        };
        let now = Local::now();
        let customer = self.customer_name.trim();
        let reference = self.payment_reference.trim();

        let ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            number,
            date: self
                .ticket_date
                .clone()
                .unwrap_or_else(|| format_ticket_date(&now)),
            created_at: now.with_timezone(&Utc),
            customer_name: (!customer.is_empty()).then(|| customer.to_string()),
            payment_method: if paid { self.payment_method } else { None },
            payment_reference: (paid && !reference.is_empty()).then(|| reference.to_string()),
            status: if paid {
                TicketStatus::Paid
            } else {
                TicketStatus::Open
            },
            items: cart.items().to_vec(),
            total: totals.total,
            total_bs: totals.total_bs,
        };

        info!(
            id = %ticket.id,
            number,
            status = ?ticket.status,
            total = %ticket.total,
            "Ticket finalized"
        );
        self.reset();
        Ok(ticket)
    }

    /// Back to Editing with empty fields. The number source keeps its
    /// position.
    pub fn reset(&mut self) {
        self.step = TicketStep::Editing;
        self.customer_name.clear();
        self.payment_method = None;
        self.payment_reference.clear();
        self.ticket_number = None;
        self.ticket_date = None;
        self.focus_requested = false;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::Catalog;
    use crate::order_state::{OrderController, OrderState};
    use crate::types::{ConsumptionMode, Subtype};

    fn allow_all(_: &OrderState, _: &Cart) -> CoreResult<()> {
        Ok(())
    }

    fn cart_with(mode: ConsumptionMode) -> Cart {
        let mut catalog = Catalog::new();
        catalog.set_price(
            "Polar Pilsen",
            "Case",
            Subtype::Bottle,
            mode.price_mode(),
            Money::from_cents(2900),
            Money::from_cents(116_000),
        );
        let mut orders = OrderController::new();
        orders.select_consumption_mode(mode);
        orders.select_emission("Case");
        orders.select_beer_type("Polar Pilsen");

        let mut cart = Cart::new();
        cart.add_to_cart(&mut orders, &allow_all, &catalog).unwrap();
        cart
    }

    fn to_payment(flow: &mut TicketFlow, cart: &Cart) {
        flow.advance(cart).unwrap();
        flow.advance(cart).unwrap();
        assert_eq!(flow.step(), TicketStep::Payment);
    }

    #[test]
    fn test_advance_rejected_on_empty_cart() {
        let mut flow = TicketFlow::new();
        assert_eq!(flow.advance(&Cart::new()), Err(CoreError::EmptyCart));
        assert_eq!(flow.step(), TicketStep::Editing);
    }

    #[test]
    fn test_linear_progression() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        assert_eq!(flow.advance(&cart), Ok(TicketStep::Confirming));
        assert_eq!(flow.ticket_number(), None);
        assert_eq!(flow.advance(&cart), Ok(TicketStep::Payment));
        assert_eq!(
            flow.advance(&cart),
            Err(CoreError::NoNextStep {
                current: TicketStep::Payment.to_string()
            })
        );
        assert_eq!(flow.step(), TicketStep::Payment);
    }

    #[test]
    fn test_number_and_date_assigned_once() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &cart);

        let number = flow.ticket_number();
        let date = flow.ticket_date().map(str::to_string);
        assert_eq!(number, Some(1));
        assert!(date.as_deref().is_some_and(|d| !d.is_empty()));

        let _ = flow.advance(&cart);
        assert_eq!(flow.ticket_number(), number);
        assert_eq!(flow.ticket_date().map(str::to_string), date);
    }

    #[test]
    fn test_mobile_payment_scenario() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &cart);

        assert!(matches!(
            flow.validate_payment(&cart),
            Err(CoreError::PaymentValidation(_))
        ));

        flow.set_payment_method(Some(PaymentMethod::MobilePayment));
        assert!(flow.take_focus_request());
        assert!(!flow.take_focus_request());
        assert!(flow.validate_payment(&cart).is_err());

        flow.set_payment_reference("  ");
        assert!(flow.validate_payment(&cart).is_err());

        flow.set_payment_reference("12-34 56");
        assert_eq!(flow.payment_reference(), "123456");
        assert_eq!(flow.validate_payment(&cart), Ok(()));
    }

    #[test]
    fn test_cash_needs_no_reference() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &cart);
        flow.set_payment_method(Some(PaymentMethod::Cash));
        assert!(!flow.take_focus_request());
        assert_eq!(flow.validate_payment(&cart), Ok(()));
    }

    #[test]
    fn test_validation_skipped_outside_payment_or_for_local() {
        let takeaway = cart_with(ConsumptionMode::Takeaway);
        let flow = TicketFlow::new();
        assert_eq!(flow.validate_payment(&takeaway), Ok(()));

        let local = cart_with(ConsumptionMode::Local);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &local);
        assert_eq!(flow.validate_payment(&local), Ok(()));
    }

    #[test]
    fn test_button_labels() {
        let takeaway = cart_with(ConsumptionMode::Takeaway);
        let local = cart_with(ConsumptionMode::Local);
        let mut flow = TicketFlow::new();
        assert_eq!(flow.button_label(&takeaway), "Continue");
        flow.advance(&takeaway).unwrap();
        assert_eq!(flow.button_label(&takeaway), "Continue");
        flow.advance(&takeaway).unwrap();
        assert_eq!(flow.button_label(&takeaway), "Pay & Create");
        assert_eq!(flow.button_label(&local), "Open Ticket");
    }

    #[test]
    fn test_focus_request_on_entering_payment() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        flow.set_payment_method(Some(PaymentMethod::MobilePayment));
        assert!(!flow.take_focus_request());
        to_payment(&mut flow, &cart);
        assert!(flow.take_focus_request());
    }

    #[test]
    fn test_customer_name_limit() {
        let mut flow = TicketFlow::new();
        flow.set_customer_name("Ana").unwrap();

        let long = "x".repeat(crate::validation::MAX_CUSTOMER_NAME_LEN + 1);
        let err = flow.set_customer_name(&long).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(flow.customer_name(), "Ana");

        flow.set_customer_name("   ").unwrap();
        assert_eq!(flow.customer_name(), "");
    }

    #[test]
    fn test_finalize_paid_ticket() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &cart);
        flow.set_customer_name("  Ana  ").unwrap();
        flow.set_payment_method(Some(PaymentMethod::Card));

        let ticket = flow.finalize(&cart, "org-1").unwrap();
        assert!(ticket.is_paid());
        assert_eq!(ticket.number, 1);
        assert_eq!(ticket.customer_name.as_deref(), Some("Ana"));
        assert_eq!(ticket.payment_method, Some(PaymentMethod::Card));
        assert_eq!(ticket.items.len(), 1);
        assert_eq!(ticket.total, Money::from_cents(2900));
        assert_eq!(ticket.total_bs, Money::from_cents(116_000));

        assert_eq!(flow.step(), TicketStep::Editing);
        assert_eq!(flow.payment_method(), None);
        assert_eq!(flow.ticket_number(), None);
    }

    #[test]
    fn test_finalize_open_ticket_and_sequence() {
        let cart = cart_with(ConsumptionMode::Local);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &cart);
        let first = flow.finalize(&cart, "org-1").unwrap();
        assert_eq!(first.status, TicketStatus::Open);
        assert_eq!(first.payment_method, None);

        to_payment(&mut flow, &cart);
        let second = flow.finalize(&cart, "org-1").unwrap();
        assert_eq!(second.number, first.number + 1);
    }

    #[test]
    fn test_finalize_requires_payment_step() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        assert!(matches!(
            flow.finalize(&cart, "org-1"),
            Err(CoreError::InvalidStep { .. })
        ));
    }

    #[test]
    fn test_finalize_blocked_by_payment_validation() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &cart);
        assert!(flow.finalize(&cart, "org-1").is_err());
        assert_eq!(flow.step(), TicketStep::Payment);
    }

    #[test]
    fn test_sequential_numbers_wrap() {
        let mut numbers = SequentialNumbers::starting_at(MAX_TICKET_NUMBER);
        assert_eq!(numbers.next_number(), MAX_TICKET_NUMBER);
        assert_eq!(numbers.next_number(), 1);
        assert_eq!(SequentialNumbers::starting_at(0).next_number(), 1);
    }

    #[test]
    fn test_random_numbers_have_four_digits() {
        let mut numbers = RandomNumbers;
        for _ in 0..100 {
            let n = numbers.next_number();
            assert!((1000..=MAX_TICKET_NUMBER).contains(&n));
        }
    }

    #[test]
    fn test_reset_returns_to_editing() {
        let cart = cart_with(ConsumptionMode::Takeaway);
        let mut flow = TicketFlow::new();
        to_payment(&mut flow, &cart);
        flow.set_payment_reference("99");
        flow.reset();
        assert_eq!(flow.step(), TicketStep::Editing);
        assert_eq!(flow.payment_reference(), "");
        assert_eq!(flow.ticket_date(), None);
    }
}
