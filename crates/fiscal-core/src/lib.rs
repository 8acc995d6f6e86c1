//! # fiscal-core: Fiscal Printer Controller
//!
//! Turns regulatory document codes into calls on a brand-specific fiscal
//! printer driver and tracks the document being printed.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Fiscal Controller Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          fiscal-service (HTTP, WebSocket RPC, CLI)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ FiscalPrinter operations              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fiscal-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   printer ──► envelope ──► controller ──► codes                │   │
//! │  │   (facade)    (faults)     (state)        (code tables)        │   │
//! │  │                               │                                │   │
//! │  │                               ▼                                │   │
//! │  │                  registry ──► driver (FiscalDriver trait)      │   │
//! │  │                               ▲                                │   │
//! │  │                             dummy (in-memory device)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ FiscalDriver                          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        Vendor drivers (serial / TCP framing, not here)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`codes`] - Regulatory code tables and the per-driver mapping
//! - [`driver`] - `FiscalDriver` trait and connection parameters
//! - [`dummy`] - In-memory printer for `port = "dummy"` and tests
//! - [`registry`] - Brand → driver constructor table
//! - [`controller`] - Document state machine
//! - [`envelope`] - Fault capture and strict/permissive mode
//! - [`printer`] - Facade combining controller and envelope
//! - [`properties`] - Named property access
//! - [`types`] - Document, buyer and line types
//! - [`error`] - Error types
//! - [`validation`] - Input checks before the driver is called
//!
//! ## Design Principles
//!
//! 1. **No Arithmetic**: amounts and rates are printed as given; the printer
//!    computes taxes and totals
//! 2. **Codes Fail Early**: an unknown code never reaches the driver
//! 3. **Failures Keep State**: a failed operation leaves the document state
//!    as it was
//!
//! ## Example Usage
//!
//! ```rust
//! use fiscal_core::{ConnectParams, DocumentRequest, FiscalPrinter, LineItem, PaymentLine};
//!
//! let mut printer = FiscalPrinter::new(true);
//! printer.connect(&ConnectParams::new("epson", "320", "dummy")).unwrap();
//!
//! // ticket (83) for a final consumer (5) without identity document (99)
//! printer.open_document(&DocumentRequest::default()).unwrap();
//! printer.add_item(&LineItem::new("Widget", 1.0, 121.0, 21.0)).unwrap();
//! printer.add_payment(&PaymentLine::new("cash", 121.0)).unwrap();
//! printer.close_document().unwrap();
//!
//! assert_eq!(printer.query_last_number(83).unwrap(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codes;
pub mod controller;
pub mod driver;
pub mod dummy;
pub mod envelope;
pub mod error;
pub mod printer;
pub mod properties;
pub mod registry;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use codes::{CodeKind, CodeMapping, IdentityDocKind, TaxCategory};
pub use controller::{Controller, DocumentRequest};
pub use driver::{Addressing, ConnectParams, FiscalDriver};
pub use envelope::FaultRecord;
pub use error::{DriverError, DriverResult, FiscalError, FiscalResult, ValidationError};
pub use printer::FiscalPrinter;
pub use properties::{Property, PropertyError, PropertyValue};
pub use registry::DriverRegistry;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Document kind opened when the caller gives none (ticket, no letter).
pub const DEFAULT_DOCUMENT_KIND: i64 = 83;

/// Tax category used when the caller gives none (final consumer).
pub const DEFAULT_TAX_CATEGORY: i64 = 5;

/// Identity document kind used when the caller gives none (unspecified).
pub const DEFAULT_IDENTITY_DOC_KIND: i64 = 99;
