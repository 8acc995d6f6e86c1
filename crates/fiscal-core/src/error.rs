//! # Error Types
//!
//! Domain-specific error types for fiscal-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fiscal-core errors (this file)                                        │
//! │  ├── FiscalError      - Everything a controller operation can raise    │
//! │  ├── DriverError      - Device/transport failure reported by a driver  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  fiscal-service errors (separate crate)                                │
//! │  └── ApiError         - What remote callers see (serialized)           │
//! │                                                                         │
//! │  Flow: DriverError → FiscalError → FaultRecord | ApiError → Client     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, operation, brand)
//! 3. Errors are enum variants, never String
//! 4. Every variant has a stable kind name used by the fault record

use thiserror::Error;

use crate::codes::CodeKind;
use crate::types::DocumentState;

// =============================================================================
// Fiscal Error
// =============================================================================

/// Errors raised by controller operations.
///
/// The fault envelope is the only place these get translated into a boolean
/// plus a stored fault record; everything below it propagates with `?`.
#[derive(Debug, Error)]
pub enum FiscalError {
    /// Unknown brand, bad addressing, or a brand with no usable device link.
    ///
    /// ## When This Occurs
    /// - `connect("olivetti", ...)` with no driver registered for that brand
    /// - TCP addressing with a port that is not a number
    /// - A built-in brand asked to talk to real hardware
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A regulatory code is not present in the active mapping.
    ///
    /// ## User Workflow
    /// ```text
    /// open_document(kind=4, ...)
    ///      │
    ///      ▼
    /// Document kind table has no entry for 4
    ///      │
    ///      ▼
    /// UnknownCode { kind: DocumentKind, code: 4 }
    ///      │
    ///      ▼
    /// Nothing was sent to the printer, state unchanged
    /// ```
    #[error("Unknown {kind} code: {code}")]
    UnknownCode { kind: CodeKind, code: i64 },

    /// Operation invoked outside the document state that allows it.
    #[error("Cannot {operation} while document is {state}")]
    InvalidState {
        operation: &'static str,
        state: DocumentState,
    },

    /// Credit note requested without the document it refers to.
    #[error("Credit note (document kind {document_kind}) requires a reference document")]
    MissingReference { document_kind: i64 },

    /// An operation that needs a printer was called before `connect`.
    #[error("No fiscal printer connected")]
    NotConnected,

    /// Failure reported by the driver (device or its transport).
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl FiscalError {
    /// Stable name of the error kind.
    ///
    /// This is what the fault record exposes as its "exception" class and
    /// what transports use as a machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            FiscalError::Configuration(_) => "ConfigurationError",
            FiscalError::UnknownCode { .. } => "UnknownCode",
            FiscalError::InvalidState { .. } => "InvalidState",
            FiscalError::MissingReference { .. } => "MissingReference",
            FiscalError::NotConnected => "NotConnected",
            FiscalError::Driver(_) => "DriverError",
            FiscalError::Validation(_) => "ValidationError",
        }
    }
}

// =============================================================================
// Driver Error
// =============================================================================

/// Failure surfaced by a printer driver.
///
/// Drivers own the vendor protocol, so the message is whatever the vendor
/// reported (status word, firmware text, I/O failure).
#[derive(Debug, Error)]
#[error("{brand} driver error: {message}")]
pub struct DriverError {
    /// Brand of the driver that failed.
    pub brand: String,

    /// Vendor-specific message.
    pub message: String,

    /// Underlying cause, when the driver has one (usually I/O).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DriverError {
    /// Creates a driver error with a vendor message.
    pub fn new(brand: impl Into<String>, message: impl Into<String>) -> Self {
        DriverError {
            brand: brand.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before anything reaches the driver.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with FiscalError.
pub type FiscalResult<T> = Result<T, FiscalError>;

/// Result type for driver calls.
pub type DriverResult<T> = Result<T, DriverError>;

// =============================================================================
// Unit Tests
// =============================================================================
