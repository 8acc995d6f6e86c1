//! # Fiscal Printer Facade
//!
//! The externally visible surface: every controller operation run through
//! the fault envelope, plus the named property accessors.
//!
//! ## Return Convention
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Outcome              Permissive             Strict                     │
//! │  ───────              ──────────             ──────                     │
//! │  success              Ok(true) / Ok(n)       Ok(true) / Ok(n)           │
//! │  failure              Ok(false) / Ok(0)      Err(FiscalError)           │
//! │                       + fault recorded       + fault recorded           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::debug;

use crate::controller::{Controller, DocumentRequest};
use crate::driver::ConnectParams;
use crate::envelope::{Envelope, FaultRecord};
use crate::error::{DriverError, FiscalError, FiscalResult};
use crate::properties::{self, Property, PropertyError, PropertyValue};
use crate::registry::DriverRegistry;
use crate::types::{DocumentState, LineItem, PaymentLine};

/// A controller wrapped in the fault envelope.
#[derive(Debug)]
pub struct FiscalPrinter {
    controller: Controller,
    envelope: Envelope,
}

impl Default for FiscalPrinter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl FiscalPrinter {
    /// Creates a printer with the built-in driver registry.
    pub fn new(strict: bool) -> Self {
        Self::with_registry(DriverRegistry::with_builtin(), strict)
    }

    /// Creates a printer whose `connect` resolves brands through `registry`.
    pub fn with_registry(registry: DriverRegistry, strict: bool) -> Self {
        Self::from_controller(Controller::new(registry), strict)
    }

    /// Wraps an existing controller.
    pub fn from_controller(controller: Controller, strict: bool) -> Self {
        FiscalPrinter {
            controller,
            envelope: Envelope::new(strict),
        }
    }

    // =========================================================================
    // Envelope State
    // =========================================================================

    pub fn strict(&self) -> bool {
        self.envelope.strict()
    }

    pub fn set_strict(&mut self, strict: bool) {
        debug!(strict, "fault mode changed");
        self.envelope.set_strict(strict);
    }

    /// Fault of the last operation, if it failed.
    pub fn fault(&self) -> Option<&FaultRecord> {
        self.envelope.fault()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn state(&self) -> DocumentState {
        self.controller.state()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn run<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut Controller) -> FiscalResult<T>,
    ) -> FiscalResult<Option<T>> {
        let controller = &mut self.controller;
        let result = self.envelope.run(operation, || f(controller));
        if let Some(fault) = self.envelope.fault() {
            let line = format!("{} failed: {}", operation, fault.summary);
            self.controller.note(line);
        }
        result
    }

    fn run_flag(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut Controller) -> FiscalResult<()>,
    ) -> FiscalResult<bool> {
        Ok(self.run(operation, f)?.is_some())
    }

    /// Recovers after an operation panicked halfway through.
    ///
    /// Records a driver fault carrying `message` and forgets the open
    /// document. Returns the recorded error for the caller to report.
    pub fn recover_from_panic(&mut self, message: &str) -> FiscalError {
        let brand = self
            .controller
            .printer()
            .map(|(brand, _)| brand.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let error = FiscalError::Driver(DriverError::new(
            brand,
            format!("operation panicked: {}", message),
        ));
        self.envelope.record("panicked operation", &error);
        self.controller.reset_document();
        self.controller
            .note(format!("panicked operation failed: {}", error));
        error
    }

    pub fn connect(&mut self, params: &ConnectParams) -> FiscalResult<bool> {
        self.run_flag("connect", |c| c.connect(params))
    }

    pub fn open_document(&mut self, request: &DocumentRequest) -> FiscalResult<bool> {
        self.run_flag("open_document", |c| c.open_document(request))
    }

    pub fn add_item(&mut self, item: &LineItem) -> FiscalResult<bool> {
        self.run_flag("add_item", |c| c.add_item(item))
    }

    pub fn add_payment(&mut self, payment: &PaymentLine) -> FiscalResult<bool> {
        self.run_flag("add_payment", |c| c.add_payment(payment))
    }

    pub fn close_document(&mut self) -> FiscalResult<bool> {
        self.run_flag("close_document", Controller::close_document)
    }

    pub fn cancel_document(&mut self) -> FiscalResult<bool> {
        self.run_flag("cancel_document", Controller::cancel_document)
    }

    /// Last issued number, `0` when a permissive call failed.
    pub fn query_last_number(&mut self, document_kind: i64) -> FiscalResult<u64> {
        Ok(self
            .run("query_last_number", |c| c.query_last_number(document_kind))?
            .unwrap_or(0))
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Reads a property by name.
    pub fn get_property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        let property: Property = name.parse()?;
        Ok(properties::get(self, property))
    }

    /// Writes a property by name.
    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        let property: Property = name.parse()?;
        properties::set(self, property, value)
    }
}
