//! # Dummy Device
//!
//! An in-memory fiscal printer selected with `port = "dummy"`. It carries the
//! symbolic constants of a real brand, records every call it receives and
//! keeps per-letter document counters, so a deployment can be exercised end
//! to end without hardware.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DummyPrinter                                     │
//! │                                                                         │
//! │   Controller ──► Box<dyn FiscalDriver> ──┐                              │
//! │                                          ▼                              │
//! │                              Arc<Mutex<DummyState>>                     │
//! │                                 • calls: Vec<DriverCall>                │
//! │                                 • last numbers per letter               │
//! │                                 • injected failures                     │
//! │                                          ▲                              │
//! │   Tests / diagnostics ──► DummyProbe ────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::codes::{IdentityDocKind, TaxCategory};
use crate::driver::FiscalDriver;
use crate::error::{DriverError, DriverResult};
use crate::types::{Buyer, DriverConstant, Letter, LineItem, PaymentLine};

// =============================================================================
// Printer Profile
// =============================================================================

/// Brand-specific constant tables.
#[derive(Debug, Clone)]
pub struct PrinterProfile {
    /// Brand name.
    pub brand: String,

    /// Tax category constants understood by this brand.
    pub tax_categories: HashMap<TaxCategory, DriverConstant>,

    /// Identity document constants understood by this brand.
    pub identity_docs: HashMap<IdentityDocKind, DriverConstant>,
}

impl PrinterProfile {
    fn build(
        brand: &str,
        tax: &[(TaxCategory, &str)],
        docs: &[(IdentityDocKind, &str)],
    ) -> Self {
        PrinterProfile {
            brand: brand.to_string(),
            tax_categories: tax.iter().map(|(k, v)| (*k, DriverConstant::new(*v))).collect(),
            identity_docs: docs.iter().map(|(k, v)| (*k, DriverConstant::new(*v))).collect(),
        }
    }

    /// Epson TM/LX family constants.
    pub fn epson() -> Self {
        use TaxCategory as T;
        Self::build(
            "epson",
            &[
                (T::ResponsableInscripto, "I"),
                (T::ResponsableNoInscripto, "R"),
                (T::NoResponsable, "N"),
                (T::Exento, "E"),
                (T::ConsumidorFinal, "F"),
                (T::ResponsableMonotributo, "M"),
                (T::NoCategorizado, "F"),
                (T::PequenioContribuyenteEventual, "F"),
                (T::MonotributistaSocial, "M"),
                (T::PequenioContribuyenteEventualSocial, "F"),
            ],
            EPSON_HASAR_DOCS,
        )
    }

    /// Hasar SMH family constants.
    pub fn hasar() -> Self {
        use TaxCategory as T;
        Self::build(
            "hasar",
            &[
                (T::ResponsableInscripto, "I"),
                (T::ResponsableNoInscripto, "N"),
                (T::NoResponsable, "A"),
                (T::Exento, "E"),
                (T::ConsumidorFinal, "C"),
                (T::ResponsableMonotributo, "M"),
                (T::NoCategorizado, "T"),
                (T::PequenioContribuyenteEventual, "V"),
                (T::MonotributistaSocial, "S"),
                (T::PequenioContribuyenteEventualSocial, "W"),
            ],
            EPSON_HASAR_DOCS,
        )
    }
}

const EPSON_HASAR_DOCS: &[(IdentityDocKind, &str)] = &[
    (IdentityDocKind::Cuit, "C"),
    (IdentityDocKind::LibretaEnrolamiento, "0"),
    (IdentityDocKind::LibretaCivica, "1"),
    (IdentityDocKind::Dni, "2"),
    (IdentityDocKind::Pasaporte, "3"),
    (IdentityDocKind::Cedula, "4"),
    (IdentityDocKind::SinCalificador, " "),
];

// =============================================================================
// Recorded Calls
// =============================================================================

/// One call received by the dummy device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum DriverCall {
    CancelAnyDocument,
    OpenTicket { letter: Option<Letter> },
    OpenBillTicket { letter: Letter, buyer: Buyer },
    OpenDebitNoteTicket { letter: Letter, buyer: Buyer },
    OpenCreditNoteTicket { letter: Letter, buyer: Buyer, reference: String },
    AddItem { item: LineItem },
    AddPayment { payment: PaymentLine },
    CloseDocument,
    GetLastNumber { letter: Option<Letter> },
}

/// Driver operation names, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    CancelAnyDocument,
    Open,
    AddItem,
    AddPayment,
    CloseDocument,
    GetLastNumber,
}

impl DriverCall {
    fn op(&self) -> DriverOp {
        match self {
            DriverCall::CancelAnyDocument => DriverOp::CancelAnyDocument,
            DriverCall::OpenTicket { .. }
            | DriverCall::OpenBillTicket { .. }
            | DriverCall::OpenDebitNoteTicket { .. }
            | DriverCall::OpenCreditNoteTicket { .. } => DriverOp::Open,
            DriverCall::AddItem { .. } => DriverOp::AddItem,
            DriverCall::AddPayment { .. } => DriverOp::AddPayment,
            DriverCall::CloseDocument => DriverOp::CloseDocument,
            DriverCall::GetLastNumber { .. } => DriverOp::GetLastNumber,
        }
    }
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Default)]
struct DummyState {
    calls: Vec<DriverCall>,
    failing: HashSet<DriverOp>,
    last_numbers: HashMap<Option<Letter>, u64>,
    open_letter: Option<Option<Letter>>,
}

/// Read/inject handle onto a dummy device that has been moved into a
/// controller.
#[derive(Debug, Clone)]
pub struct DummyProbe {
    state: Arc<Mutex<DummyState>>,
}

impl DummyProbe {
    fn with_state<R>(&self, f: impl FnOnce(&mut DummyState) -> R) -> R {
        let mut state = self.state.lock().expect("Dummy printer mutex poisoned");
        f(&mut state)
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.with_state(|s| s.calls.clone())
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear())
    }

    /// Makes every future call of `op` fail until [`DummyProbe::recover`].
    pub fn fail_on(&self, op: DriverOp) {
        self.with_state(|s| {
            s.failing.insert(op);
        })
    }

    /// Clears all injected failures.
    pub fn recover(&self) {
        self.with_state(|s| s.failing.clear())
    }

    /// Seeds the last issued number for a letter.
    pub fn set_last_number(&self, letter: Option<Letter>, number: u64) {
        self.with_state(|s| {
            s.last_numbers.insert(letter, number);
        })
    }
}

// =============================================================================
// Dummy Printer
// =============================================================================

/// The dummy fiscal printer.
#[derive(Debug)]
pub struct DummyPrinter {
    profile: PrinterProfile,
    model: String,
    state: Arc<Mutex<DummyState>>,
}

impl DummyPrinter {
    /// Creates a dummy printer for a brand profile and model.
    pub fn new(profile: PrinterProfile, model: impl Into<String>) -> Self {
        DummyPrinter {
            profile,
            model: model.into(),
            state: Arc::new(Mutex::new(DummyState::default())),
        }
    }

    /// Returns a probe sharing this printer's state.
    pub fn probe(&self) -> DummyProbe {
        DummyProbe {
            state: self.state.clone(),
        }
    }

    /// Records a call, failing it if a failure was injected for its op.
    fn record(&self, call: DriverCall) -> DriverResult<()> {
        debug!(brand = %self.profile.brand, ?call, "dummy printer call");
        let mut state = self.state.lock().expect("Dummy printer mutex poisoned");
        let op = call.op();
        state.calls.push(call);
        if state.failing.contains(&op) {
            return Err(DriverError::new(
                &self.profile.brand,
                format!("simulated failure on {:?}", op),
            ));
        }
        Ok(())
    }

    fn mark_open(&self, letter: Option<Letter>) {
        let mut state = self.state.lock().expect("Dummy printer mutex poisoned");
        state.open_letter = Some(letter);
    }
}

impl FiscalDriver for DummyPrinter {
    fn brand(&self) -> &str {
        &self.profile.brand
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn tax_category(&self, category: TaxCategory) -> Option<DriverConstant> {
        self.profile.tax_categories.get(&category).cloned()
    }

    fn identity_doc(&self, kind: IdentityDocKind) -> Option<DriverConstant> {
        self.profile.identity_docs.get(&kind).cloned()
    }

    fn cancel_any_document(&mut self) -> DriverResult<()> {
        self.record(DriverCall::CancelAnyDocument)?;
        let mut state = self.state.lock().expect("Dummy printer mutex poisoned");
        state.open_letter = None;
        Ok(())
    }

    fn open_ticket(&mut self, letter: Option<Letter>) -> DriverResult<()> {
        self.record(DriverCall::OpenTicket { letter })?;
        self.mark_open(letter);
        Ok(())
    }

    fn open_bill_ticket(&mut self, letter: Letter, buyer: &Buyer) -> DriverResult<()> {
        self.record(DriverCall::OpenBillTicket {
            letter,
            buyer: buyer.clone(),
        })?;
        self.mark_open(Some(letter));
        Ok(())
    }

    fn open_debit_note_ticket(&mut self, letter: Letter, buyer: &Buyer) -> DriverResult<()> {
        self.record(DriverCall::OpenDebitNoteTicket {
            letter,
            buyer: buyer.clone(),
        })?;
        self.mark_open(Some(letter));
        Ok(())
    }

    fn open_credit_note_ticket(
        &mut self,
        letter: Letter,
        buyer: &Buyer,
        reference: &str,
    ) -> DriverResult<()> {
        self.record(DriverCall::OpenCreditNoteTicket {
            letter,
            buyer: buyer.clone(),
            reference: reference.to_string(),
        })?;
        self.mark_open(Some(letter));
        Ok(())
    }

    fn add_item(&mut self, item: &LineItem) -> DriverResult<()> {
        self.record(DriverCall::AddItem { item: item.clone() })
    }

    fn add_payment(&mut self, payment: &PaymentLine) -> DriverResult<()> {
        self.record(DriverCall::AddPayment {
            payment: payment.clone(),
        })
    }

    fn close_document(&mut self) -> DriverResult<()> {
        self.record(DriverCall::CloseDocument)?;
        let mut state = self.state.lock().expect("Dummy printer mutex poisoned");
        if let Some(letter) = state.open_letter.take() {
            *state.last_numbers.entry(letter).or_insert(0) += 1;
        }
        Ok(())
    }

    fn get_last_number(&mut self, letter: Option<Letter>) -> DriverResult<u64> {
        self.record(DriverCall::GetLastNumber { letter })?;
        let state = self.state.lock().expect("Dummy printer mutex poisoned");
        Ok(state.last_numbers.get(&letter).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let mut printer = DummyPrinter::new(PrinterProfile::epson(), "320");
        let probe = printer.probe();

        printer.cancel_any_document().unwrap();
        printer.open_ticket(None).unwrap();
        printer.close_document().unwrap();

        assert_eq!(
            probe.calls(),
            vec![
                DriverCall::CancelAnyDocument,
                DriverCall::OpenTicket { letter: None },
                DriverCall::CloseDocument,
            ]
        );
    }

    #[test]
    fn test_close_advances_counter_of_open_letter() {
        let mut printer = DummyPrinter::new(PrinterProfile::hasar(), "615");
        printer.probe().set_last_number(None, 41);

        printer.open_ticket(None).unwrap();
        printer.close_document().unwrap();

        assert_eq!(printer.get_last_number(None).unwrap(), 42);
        assert_eq!(printer.get_last_number(Some(Letter::A)).unwrap(), 0);
    }

    #[test]
    fn test_injected_failure_is_recorded_and_reported() {
        let mut printer = DummyPrinter::new(PrinterProfile::epson(), "320");
        let probe = printer.probe();
        probe.fail_on(DriverOp::AddPayment);

        let err = printer
            .add_payment(&PaymentLine::new("cash", 10.0))
            .unwrap_err();
        assert_eq!(err.brand, "epson");
        assert_eq!(probe.calls().len(), 1);

        probe.recover();
        assert!(printer.add_payment(&PaymentLine::new("cash", 10.0)).is_ok());
    }

    #[test]
    fn test_profiles_differ_per_brand() {
        let epson = DummyPrinter::new(PrinterProfile::epson(), "320");
        let hasar = DummyPrinter::new(PrinterProfile::hasar(), "615");
        assert_ne!(
            epson.tax_category(TaxCategory::ConsumidorFinal),
            hasar.tax_category(TaxCategory::ConsumidorFinal)
        );
        assert_eq!(
            epson.identity_doc(IdentityDocKind::Dni),
            hasar.identity_doc(IdentityDocKind::Dni)
        );
    }
}
