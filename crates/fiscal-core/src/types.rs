//! # Domain Types
//!
//! Core domain types used throughout the fiscal controller.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ DocumentClass   │   │    LineItem     │   │  PaymentLine    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Ticket(letter?)│   │  description    │   │  description    │       │
//! │  │  Invoice(A|B|C) │   │  quantity       │   │  amount         │       │
//! │  │  DebitNote(..)  │   │  amount         │   └─────────────────┘       │
//! │  │  CreditNote(..) │   │  vat_rate       │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ DocumentState   │   │     Buyer       │   │ DriverConstant  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Idle           │   │  name, address  │   │  "I", "F", "2"  │       │
//! │  │  Open           │   │  doc number     │   │  vendor symbol  │       │
//! │  └─────────────────┘   │  doc / tax const│   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Amounts
//! Amounts are plain `f64`. The controller never computes taxes; whatever the
//! caller supplies goes to the printer unchanged, and the printer firmware
//! owns rounding.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Document State
// =============================================================================

/// Lifecycle state of the fiscal document on the printer.
///
/// ```text
///   ┌──────┐  open_document   ┌──────┐
///   │ Idle │ ───────────────► │ Open │ ◄─┐ add_item / add_payment
///   └──────┘ ◄─────────────── └──────┘ ──┘
///        close_document / cancel_document
/// ```
///
/// There is no retained "closed" state: a successful close goes straight
/// back to `Idle`, ready for the next document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    /// No document open.
    #[default]
    Idle,
    /// Document open and accepting items and payments.
    Open,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentState::Idle => write!(f, "idle"),
            DocumentState::Open => write!(f, "open"),
        }
    }
}

// =============================================================================
// Letter & Document Class
// =============================================================================

/// Letter category of a fiscal document (A, B or C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
}

impl Letter {
    /// The letter as the printer expects it.
    pub const fn as_char(&self) -> char {
        match self {
            Letter::A => 'A',
            Letter::B => 'B',
            Letter::C => 'C',
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Document family plus letter, as resolved from a document kind code.
///
/// Invoices and notes always carry a letter, so the type makes an
/// invoice without one unrepresentable. Tickets carry `None` when no letter
/// applies: that is a valid answer, distinct from a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", content = "letter", rename_all = "snake_case")]
pub enum DocumentClass {
    /// Ticket (tique), optionally lettered.
    Ticket(Option<Letter>),
    /// Invoice or ticket-invoice.
    Invoice(Letter),
    /// Debit note.
    DebitNote(Letter),
    /// Credit note; opening one needs a reference document.
    CreditNote(Letter),
}

impl DocumentClass {
    /// Letter passed to the driver, `None` meaning "no letter applicable".
    pub const fn letter(&self) -> Option<Letter> {
        match self {
            DocumentClass::Ticket(letter) => *letter,
            DocumentClass::Invoice(letter)
            | DocumentClass::DebitNote(letter)
            | DocumentClass::CreditNote(letter) => Some(*letter),
        }
    }

    /// Short family name used in logs.
    pub const fn family(&self) -> &'static str {
        match self {
            DocumentClass::Ticket(_) => "ticket",
            DocumentClass::Invoice(_) => "invoice",
            DocumentClass::DebitNote(_) => "debit_note",
            DocumentClass::CreditNote(_) => "credit_note",
        }
    }
}

// =============================================================================
// Driver Constant
// =============================================================================

/// Symbolic value a specific driver expects for a tax category or an
/// identity document kind (e.g. `"I"` for responsable inscripto).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverConstant(String);

impl DriverConstant {
    /// Wraps a driver symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        DriverConstant(symbol.into())
    }

    /// Returns the raw symbol.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DriverConstant {
    fn from(symbol: &str) -> Self {
        DriverConstant::new(symbol)
    }
}

impl fmt::Display for DriverConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Buyer
// =============================================================================

/// Buyer data sent when opening an invoice or a note.
///
/// `doc_kind` and `tax_category` are already translated to the driver's own
/// constants by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    /// Buyer name (may be empty for final consumers).
    pub name: String,

    /// Buyer address.
    pub address: String,

    /// Identity document number, verbatim.
    pub doc_number: String,

    /// Identity document kind, driver constant.
    pub doc_kind: DriverConstant,

    /// Buyer tax category, driver constant.
    pub tax_category: DriverConstant,
}

// =============================================================================
// Line Item
// =============================================================================

/// Default VAT rate applied when the caller omits it (21%).
pub const DEFAULT_VAT_RATE: f64 = 21.0;

/// A line item as handed to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Text printed on the line.
    pub description: String,

    /// Quantity.
    pub quantity: f64,

    /// Final line amount as supplied by the caller.
    pub amount: f64,

    /// VAT rate in percent (21.0 = 21%).
    #[serde(default = "default_vat_rate")]
    pub vat_rate: f64,

    /// Reserved; the public surface always leaves it empty.
    #[serde(default, skip_deserializing)]
    pub discount: Option<f64>,

    /// Reserved; the public surface always leaves it empty.
    #[serde(default, skip_deserializing)]
    pub discount_description: Option<String>,
}

fn default_vat_rate() -> f64 {
    DEFAULT_VAT_RATE
}

impl LineItem {
    /// Creates a line item with no discount.
    pub fn new(description: impl Into<String>, quantity: f64, amount: f64, vat_rate: f64) -> Self {
        LineItem {
            description: description.into(),
            quantity,
            amount,
            vat_rate,
            discount: None,
            discount_description: None,
        }
    }
}

// =============================================================================
// Payment Line
// =============================================================================

/// A payment line (method description and amount).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLine {
    /// Payment method text, e.g. "efectivo".
    pub description: String,

    /// Amount paid with this method.
    pub amount: f64,
}

impl PaymentLine {
    /// Creates a payment line.
    pub fn new(description: impl Into<String>, amount: f64) -> Self {
        PaymentLine {
            description: description.into(),
            amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_wire_defaults() {
        let item: LineItem = serde_json::from_str(
            r#"{"description":"Widget","quantity":1.0,"amount":121.0,"discount":5.0}"#,
        )
        .unwrap();
        assert_eq!(item, LineItem::new("Widget", 1.0, 121.0, DEFAULT_VAT_RATE));
    }

    #[test]
    fn test_ticket_without_letter() {
        let class = DocumentClass::Ticket(None);
        assert_eq!(class.letter(), None);
        assert_eq!(class.family(), "ticket");
    }

    #[test]
    fn test_lettered_families() {
        assert_eq!(DocumentClass::Invoice(Letter::A).letter(), Some(Letter::A));
        assert_eq!(DocumentClass::CreditNote(Letter::C).letter(), Some(Letter::C));
        assert_eq!(Letter::B.to_string(), "B");
    }

    #[test]
    fn test_line_item_has_no_discount() {
        let item = LineItem::new("Widget", 1.0, 121.0, DEFAULT_VAT_RATE);
        assert_eq!(item.discount, None);
        assert_eq!(item.discount_description, None);
        assert_eq!(item.vat_rate, 21.0);
    }

    #[test]
    fn test_document_class_serialization() {
        let json = serde_json::to_string(&DocumentClass::Invoice(Letter::B)).unwrap();
        assert_eq!(json, r#"{"family":"invoice","letter":"B"}"#);
    }
}
