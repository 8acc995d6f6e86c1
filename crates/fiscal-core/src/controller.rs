//! # Fiscal Document Controller
//!
//! The state machine between callers and the printer driver. It is the only
//! component that knows how regulatory codes combine into a driver call.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Controller Operations                               │
//! │                                                                         │
//! │  Operation           Valid in      Driver calls              New state  │
//! │  ─────────           ────────      ────────────              ─────────  │
//! │  connect             Idle          (none, builds mapping)    unchanged  │
//! │  open_document       Idle          cancel_any + open_*       Open       │
//! │  add_item            Open          add_item                  Open       │
//! │  add_payment         Open          add_payment               Open       │
//! │  close_document      Open          close_document            Idle       │
//! │  cancel_document     any           cancel_any                Idle       │
//! │  query_last_number   any           get_last_number           unchanged  │
//! │                                                                         │
//! │  Any failure leaves the state exactly as it was before the call.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! One caller at a time. There is no internal locking; transports put the
//! controller behind their own mutex.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::codes::{self, CodeMapping};
use crate::driver::{ConnectParams, FiscalDriver};
use crate::error::{FiscalError, FiscalResult};
use crate::registry::DriverRegistry;
use crate::types::{Buyer, DocumentClass, DocumentState, LineItem, PaymentLine};
use crate::validation;

/// Entries kept in the debug log.
pub const DEBUG_LOG_CAPACITY: usize = 200;

// =============================================================================
// Document Request
// =============================================================================

/// Arguments of `open_document`.
///
/// Defaults describe the most common document: a ticket (83) for a final
/// consumer (5) with an unspecified identity document (99).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentRequest {
    /// Document kind code (tipo_cbte).
    pub document_kind: i64,

    /// Buyer tax category code (tipo_responsable).
    pub tax_category: i64,

    /// Buyer identity document kind code (tipo_doc).
    pub identity_doc_kind: i64,

    /// Buyer identity document number, sent verbatim.
    #[serde(deserialize_with = "string_or_number")]
    pub identity_doc_number: String,

    /// Buyer name.
    pub buyer_name: String,

    /// Buyer address.
    pub buyer_address: String,

    /// Original document for credit notes (and optionally debit notes).
    pub reference: Option<String>,
}

impl Default for DocumentRequest {
    fn default() -> Self {
        DocumentRequest {
            document_kind: crate::DEFAULT_DOCUMENT_KIND,
            tax_category: crate::DEFAULT_TAX_CATEGORY,
            identity_doc_kind: crate::DEFAULT_IDENTITY_DOC_KIND,
            identity_doc_number: "0".to_string(),
            buyer_name: String::new(),
            buyer_address: String::new(),
            reference: None,
        }
    }
}

/// Accepts `"20267565393"` as well as `20267565393`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

// =============================================================================
// Debug Log
// =============================================================================

/// Bounded journal of controller activity.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    entries: VecDeque<(DateTime<Utc>, String)>,
}

impl DebugLog {
    /// Appends an entry, dropping the oldest past capacity.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.entries.len() == DEBUG_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((Utc::now(), line.into()));
    }

    /// Number of entries kept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was logged yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The journal as text, one entry per line, oldest first.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(at, line)| format!("{} {}", at.to_rfc3339(), line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Owns the driver, the code mapping and the document state.
#[derive(Debug)]
pub struct Controller {
    registry: DriverRegistry,
    driver: Option<Box<dyn FiscalDriver>>,
    mapping: CodeMapping,
    state: DocumentState,
    log: DebugLog,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(DriverRegistry::with_builtin())
    }
}

impl Controller {
    /// Creates an unconnected controller using `registry` for `connect`.
    pub fn new(registry: DriverRegistry) -> Self {
        Controller {
            registry,
            driver: None,
            mapping: CodeMapping::default(),
            state: DocumentState::Idle,
            log: DebugLog::default(),
        }
    }

    /// Creates a controller already attached to `driver`.
    ///
    /// Used by embedders that build their driver themselves.
    pub fn with_driver(registry: DriverRegistry, driver: Box<dyn FiscalDriver>) -> Self {
        let mut controller = Self::new(registry);
        controller.attach(driver);
        controller
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current document state.
    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// True once a driver is attached.
    pub fn is_connected(&self) -> bool {
        self.driver.is_some()
    }

    /// Brand and model of the attached driver.
    pub fn printer(&self) -> Option<(&str, &str)> {
        self.driver.as_deref().map(|d| (d.brand(), d.model()))
    }

    /// Active code mapping (empty until connected).
    pub fn mapping(&self) -> &CodeMapping {
        &self.mapping
    }

    /// Debug journal.
    pub fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    /// Appends a line to the debug journal.
    pub fn note(&mut self, line: impl Into<String>) {
        self.log.push(line);
    }

    /// Forgets the local document state without talking to the printer.
    ///
    /// Used after an operation was aborted halfway and the printer state is
    /// unknown; the next `open_document` cancels whatever the device holds.
    pub fn reset_document(&mut self) {
        if self.state == DocumentState::Open {
            info!("document state reset without printer confirmation");
        }
        self.state = DocumentState::Idle;
        self.log.push("reset_document");
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Instantiates the driver for `params` and rebuilds the code mapping.
    ///
    /// Refused while a document is open: swapping printers mid-document
    /// would orphan the document on the old one.
    pub fn connect(&mut self, params: &ConnectParams) -> FiscalResult<()> {
        validation::validate_brand(&params.brand)?;
        if self.state == DocumentState::Open {
            return Err(FiscalError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }

        let driver = self.registry.create(params)?;
        self.attach(driver);
        info!(brand = %params.brand, model = %params.model, port = %params.port, "printer connected");
        Ok(())
    }

    fn attach(&mut self, driver: Box<dyn FiscalDriver>) {
        self.mapping = CodeMapping::build(driver.as_ref());
        let (tax, docs) = self.mapping.coverage();
        self.log.push(format!(
            "connect brand={} model={} tax_categories={} identity_docs={}",
            driver.brand(),
            driver.model(),
            tax,
            docs
        ));
        self.driver = Some(driver);
    }

    /// Opens a fiscal document.
    ///
    /// ## Steps
    /// 1. Resolve document kind, tax category and identity document codes
    ///    (any unknown code fails before the printer is touched, even while
    ///    another document is open)
    /// 2. Refuse if a document is already open
    /// 3. Cancel whatever the printer has open
    /// 4. Call the `open_*` entry point of the document family
    pub fn open_document(&mut self, request: &DocumentRequest) -> FiscalResult<()> {
        let class = codes::document_class(request.document_kind)?;
        if self.driver.is_none() {
            return Err(FiscalError::NotConnected);
        }
        let tax_category = self.mapping.tax_category(request.tax_category)?.clone();
        let doc_kind = self.mapping.identity_doc(request.identity_doc_kind)?.clone();

        if self.state == DocumentState::Open {
            return Err(FiscalError::InvalidState {
                operation: "open document",
                state: self.state,
            });
        }

        let reference = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        if matches!(class, DocumentClass::CreditNote(_)) && reference.is_none() {
            return Err(FiscalError::MissingReference {
                document_kind: request.document_kind,
            });
        }

        let buyer = Buyer {
            name: request.buyer_name.clone(),
            address: request.buyer_address.clone(),
            doc_number: request.identity_doc_number.clone(),
            doc_kind,
            tax_category,
        };

        let driver = self.driver.as_deref_mut().ok_or(FiscalError::NotConnected)?;
        driver.cancel_any_document()?;
        match class {
            DocumentClass::Ticket(letter) => driver.open_ticket(letter)?,
            DocumentClass::Invoice(letter) => driver.open_bill_ticket(letter, &buyer)?,
            DocumentClass::DebitNote(letter) => driver.open_debit_note_ticket(letter, &buyer)?,
            DocumentClass::CreditNote(letter) => {
                // checked above
                let reference = reference.unwrap_or_default();
                driver.open_credit_note_ticket(letter, &buyer, reference)?
            }
        }

        self.state = DocumentState::Open;
        debug!(family = class.family(), letter = ?class.letter(), "document opened");
        self.log.push(format!(
            "open_document kind={} family={} letter={:?}",
            request.document_kind,
            class.family(),
            class.letter()
        ));
        Ok(())
    }

    /// Prints an item on the open document. No tax is computed.
    pub fn add_item(&mut self, item: &LineItem) -> FiscalResult<()> {
        let driver = self.open_driver("add item")?;
        validation::validate_item(item)?;
        driver.add_item(item)?;
        self.log.push(format!(
            "add_item description={:?} quantity={} amount={} vat_rate={}",
            item.description, item.quantity, item.amount, item.vat_rate
        ));
        Ok(())
    }

    /// Prints a payment line on the open document.
    pub fn add_payment(&mut self, payment: &PaymentLine) -> FiscalResult<()> {
        let driver = self.open_driver("add payment")?;
        validation::validate_payment(payment)?;
        driver.add_payment(payment)?;
        self.log.push(format!(
            "add_payment description={:?} amount={}",
            payment.description, payment.amount
        ));
        Ok(())
    }

    /// Closes the open document and returns to `Idle`.
    pub fn close_document(&mut self) -> FiscalResult<()> {
        self.open_driver("close document")?.close_document()?;
        self.state = DocumentState::Idle;
        info!("document closed");
        self.log.push("close_document");
        Ok(())
    }

    /// Cancels any document on the printer and returns to `Idle`.
    pub fn cancel_document(&mut self) -> FiscalResult<()> {
        let driver = self.driver.as_deref_mut().ok_or(FiscalError::NotConnected)?;
        driver.cancel_any_document()?;
        if self.state == DocumentState::Open {
            info!("open document cancelled");
        }
        self.state = DocumentState::Idle;
        self.log.push("cancel_document");
        Ok(())
    }

    /// Last number issued for the family/letter of `document_kind`.
    pub fn query_last_number(&mut self, document_kind: i64) -> FiscalResult<u64> {
        let class = codes::document_class(document_kind)?;
        let driver = self.driver.as_deref_mut().ok_or(FiscalError::NotConnected)?;
        let number = driver.get_last_number(class.letter())?;
        debug!(document_kind, number, "last number queried");
        Ok(number)
    }

    /// Driver for an operation that needs an open document.
    fn open_driver(
        &mut self,
        operation: &'static str,
    ) -> FiscalResult<&mut Box<dyn FiscalDriver>> {
        if self.state != DocumentState::Open {
            return Err(FiscalError::InvalidState {
                operation,
                state: self.state,
            });
        }
        self.driver.as_mut().ok_or(FiscalError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::CodeKind;
    use crate::dummy::{DriverCall, DriverOp, DummyPrinter, DummyProbe, PrinterProfile};
    use crate::types::{DriverConstant, Letter};

    fn connected() -> (Controller, DummyProbe) {
        let printer = DummyPrinter::new(PrinterProfile::epson(), "320");
        let probe = printer.probe();
        let controller = Controller::with_driver(DriverRegistry::with_builtin(), Box::new(printer));
        (controller, probe)
    }

    fn invoice_a() -> DocumentRequest {
        DocumentRequest {
            document_kind: 1,
            tax_category: 1,
            identity_doc_kind: 80,
            identity_doc_number: "20267565393".to_string(),
            buyer_name: "Joao Da Silva".to_string(),
            buyer_address: "Rua 76 km 34.5 Alagoas".to_string(),
            reference: None,
        }
    }

    #[test]
    fn test_end_to_end_ticket() {
        let mut controller = Controller::default();
        controller
            .connect(&ConnectParams::new("epson", "320", "dummy"))
            .unwrap();
        assert_eq!(controller.printer(), Some(("epson", "320")));

        controller.open_document(&DocumentRequest::default()).unwrap();
        assert_eq!(controller.state(), DocumentState::Open);
        controller
            .add_item(&LineItem::new("Widget", 1.0, 121.0, 21.0))
            .unwrap();
        controller
            .add_payment(&PaymentLine::new("cash", 121.0))
            .unwrap();
        controller.close_document().unwrap();
        assert_eq!(controller.state(), DocumentState::Idle);
        assert_eq!(controller.query_last_number(83).unwrap(), 1);
    }

    #[test]
    fn test_ticket_driver_sequence() {
        let (mut controller, probe) = connected();

        controller.open_document(&DocumentRequest::default()).unwrap();
        controller
            .add_item(&LineItem::new("Widget", 1.0, 121.0, 21.0))
            .unwrap();
        controller
            .add_payment(&PaymentLine::new("cash", 121.0))
            .unwrap();
        controller.close_document().unwrap();

        assert_eq!(
            probe.calls(),
            vec![
                DriverCall::CancelAnyDocument,
                DriverCall::OpenTicket { letter: None },
                DriverCall::AddItem {
                    item: LineItem {
                        description: "Widget".to_string(),
                        quantity: 1.0,
                        amount: 121.0,
                        vat_rate: 21.0,
                        discount: None,
                        discount_description: None,
                    }
                },
                DriverCall::AddPayment {
                    payment: PaymentLine::new("cash", 121.0)
                },
                DriverCall::CloseDocument,
            ]
        );
    }

    #[test]
    fn test_open_close_without_lines() {
        let (mut controller, _) = connected();
        controller.open_document(&DocumentRequest::default()).unwrap();
        controller.close_document().unwrap();
        assert_eq!(controller.state(), DocumentState::Idle);
    }

    #[test]
    fn test_invoice_translates_buyer_codes() {
        let (mut controller, probe) = connected();
        controller.open_document(&invoice_a()).unwrap();

        let calls = probe.calls();
        assert_eq!(
            calls[1],
            DriverCall::OpenBillTicket {
                letter: Letter::A,
                buyer: Buyer {
                    name: "Joao Da Silva".to_string(),
                    address: "Rua 76 km 34.5 Alagoas".to_string(),
                    doc_number: "20267565393".to_string(),
                    doc_kind: DriverConstant::new("C"),
                    tax_category: DriverConstant::new("I"),
                }
            }
        );
    }

    #[test]
    fn test_debit_note_dispatch() {
        let (mut controller, probe) = connected();
        let request = DocumentRequest {
            document_kind: 7,
            ..invoice_a()
        };
        controller.open_document(&request).unwrap();
        assert!(matches!(
            probe.calls()[1],
            DriverCall::OpenDebitNoteTicket { letter: Letter::B, .. }
        ));
    }

    #[test]
    fn test_credit_note_requires_reference() {
        let (mut controller, probe) = connected();
        let request = DocumentRequest {
            document_kind: 3,
            ..invoice_a()
        };

        let err = controller.open_document(&request).unwrap_err();
        assert!(matches!(err, FiscalError::MissingReference { document_kind: 3 }));
        assert_eq!(controller.state(), DocumentState::Idle);
        assert!(probe.calls().is_empty());

        let blank = DocumentRequest {
            reference: Some("   ".to_string()),
            ..request.clone()
        };
        assert!(matches!(
            controller.open_document(&blank),
            Err(FiscalError::MissingReference { .. })
        ));
    }

    #[test]
    fn test_credit_note_passes_reference_unmodified() {
        let (mut controller, probe) = connected();
        let request = DocumentRequest {
            document_kind: 8,
            reference: Some("0001-00000123".to_string()),
            ..invoice_a()
        };
        controller.open_document(&request).unwrap();

        match &probe.calls()[1] {
            DriverCall::OpenCreditNoteTicket { letter, reference, .. } => {
                assert_eq!(*letter, Letter::B);
                assert_eq!(reference, "0001-00000123");
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_unknown_codes_leave_state_and_printer_untouched() {
        let (mut controller, probe) = connected();

        for (request, kind) in [
            (DocumentRequest { document_kind: 4, ..Default::default() }, CodeKind::DocumentKind),
            (DocumentRequest { tax_category: 9, ..Default::default() }, CodeKind::TaxCategory),
            (DocumentRequest { identity_doc_kind: 1, ..Default::default() }, CodeKind::IdentityDoc),
        ] {
            let err = controller.open_document(&request).unwrap_err();
            assert!(matches!(err, FiscalError::UnknownCode { kind: k, .. } if k == kind));
            assert_eq!(controller.state(), DocumentState::Idle);
        }
        assert!(probe.calls().is_empty());

        assert!(matches!(
            controller.query_last_number(5),
            Err(FiscalError::UnknownCode { kind: CodeKind::DocumentKind, code: 5 })
        ));
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_unknown_code_while_open_keeps_document_open() {
        let (mut controller, probe) = connected();
        controller.open_document(&DocumentRequest::default()).unwrap();
        probe.clear_calls();

        assert!(controller.query_last_number(77).is_err());
        let err = controller
            .open_document(&DocumentRequest { document_kind: 4, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, FiscalError::UnknownCode { kind: CodeKind::DocumentKind, code: 4 }));
        let err = controller
            .open_document(&DocumentRequest { tax_category: 9, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, FiscalError::UnknownCode { kind: CodeKind::TaxCategory, code: 9 }));

        let err = controller.open_document(&DocumentRequest::default()).unwrap_err();
        assert!(matches!(err, FiscalError::InvalidState { state: DocumentState::Open, .. }));
        assert_eq!(controller.state(), DocumentState::Open);
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_lines_require_open_document() {
        let (mut controller, probe) = connected();

        let err = controller
            .add_item(&LineItem::new("Widget", 1.0, 1.0, 21.0))
            .unwrap_err();
        assert!(matches!(
            err,
            FiscalError::InvalidState { state: DocumentState::Idle, .. }
        ));
        assert!(controller
            .add_payment(&PaymentLine::new("cash", 1.0))
            .is_err());
        assert!(matches!(
            controller.close_document(),
            Err(FiscalError::InvalidState { .. })
        ));
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_open_twice_is_invalid() {
        let (mut controller, _) = connected();
        controller.open_document(&DocumentRequest::default()).unwrap();
        assert!(matches!(
            controller.open_document(&DocumentRequest::default()),
            Err(FiscalError::InvalidState { state: DocumentState::Open, .. })
        ));
    }

    #[test]
    fn test_lines_keep_order() {
        let (mut controller, probe) = connected();
        controller.open_document(&DocumentRequest::default()).unwrap();
        probe.clear_calls();

        controller.add_item(&LineItem::new("a", 1.0, 10.0, 21.0)).unwrap();
        controller.add_payment(&PaymentLine::new("cash", 5.0)).unwrap();
        controller.add_item(&LineItem::new("b", 2.0, 20.0, 10.5)).unwrap();
        controller.add_payment(&PaymentLine::new("card", 25.0)).unwrap();

        let order: Vec<String> = probe
            .calls()
            .into_iter()
            .map(|call| match call {
                DriverCall::AddItem { item } => item.description,
                DriverCall::AddPayment { payment } => payment.description,
                other => panic!("unexpected call {:?}", other),
            })
            .collect();
        assert_eq!(order, vec!["a", "cash", "b", "card"]);
    }

    #[test]
    fn test_driver_failure_keeps_state() {
        let (mut controller, probe) = connected();

        probe.fail_on(DriverOp::Open);
        assert!(matches!(
            controller.open_document(&DocumentRequest::default()),
            Err(FiscalError::Driver(_))
        ));
        assert_eq!(controller.state(), DocumentState::Idle);

        probe.recover();
        controller.open_document(&DocumentRequest::default()).unwrap();
        probe.fail_on(DriverOp::CloseDocument);
        assert!(controller.close_document().is_err());
        assert_eq!(controller.state(), DocumentState::Open);
    }

    #[test]
    fn test_cancel_recovers_from_failed_close() {
        let (mut controller, probe) = connected();
        controller.open_document(&DocumentRequest::default()).unwrap();
        probe.fail_on(DriverOp::CloseDocument);
        assert!(controller.close_document().is_err());

        controller.cancel_document().unwrap();
        assert_eq!(controller.state(), DocumentState::Idle);
    }

    #[test]
    fn test_not_connected() {
        let mut controller = Controller::default();
        assert!(matches!(
            controller.open_document(&DocumentRequest::default()),
            Err(FiscalError::NotConnected)
        ));
        assert!(matches!(
            controller.query_last_number(83),
            Err(FiscalError::NotConnected)
        ));
        assert!(matches!(
            controller.cancel_document(),
            Err(FiscalError::NotConnected)
        ));
    }

    #[test]
    fn test_connect_refused_while_open() {
        let (mut controller, _) = connected();
        controller.open_document(&DocumentRequest::default()).unwrap();

        let err = controller
            .connect(&ConnectParams::new("hasar", "615", "dummy"))
            .unwrap_err();
        assert!(matches!(err, FiscalError::InvalidState { operation: "connect", .. }));
        assert_eq!(controller.printer(), Some(("epson", "320")));
    }

    #[test]
    fn test_reconnect_rebuilds_mapping() {
        let mut controller = Controller::default();
        controller
            .connect(&ConnectParams::new("epson", "320", "dummy"))
            .unwrap();
        assert_eq!(controller.mapping().tax_category(5).unwrap().as_str(), "F");

        controller
            .connect(&ConnectParams::new("hasar", "615", "dummy"))
            .unwrap();
        assert_eq!(controller.mapping().tax_category(5).unwrap().as_str(), "C");
    }

    #[test]
    fn test_non_finite_amount_never_reaches_driver() {
        let (mut controller, probe) = connected();
        controller.open_document(&DocumentRequest::default()).unwrap();
        probe.clear_calls();

        assert!(matches!(
            controller.add_item(&LineItem::new("Widget", 1.0, f64::NAN, 21.0)),
            Err(FiscalError::Validation(_))
        ));
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_request_accepts_numeric_doc_number() {
        let request: DocumentRequest = serde_json::from_str(
            r#"{"document_kind":6,"identity_doc_kind":80,"identity_doc_number":20267565393}"#,
        )
        .unwrap();
        assert_eq!(request.identity_doc_number, "20267565393");
        assert_eq!(request.tax_category, 5);
    }

    #[test]
    fn test_debug_log_is_bounded() {
        let mut log = DebugLog::default();
        for i in 0..(DEBUG_LOG_CAPACITY + 10) {
            log.push(format!("entry {}", i));
        }
        assert_eq!(log.len(), DEBUG_LOG_CAPACITY);
        assert!(log.render().ends_with(&format!("entry {}", DEBUG_LOG_CAPACITY + 9)));
        assert!(!log.render().contains("entry 0\n"));
    }
}
