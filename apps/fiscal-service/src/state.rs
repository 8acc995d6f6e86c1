//! # Controller State
//!
//! The one printer every transport shares.
//!
//! ## Thread Safety
//! `Arc<Mutex<FiscalPrinter>>`: every operation takes the lock for its whole
//! duration, so calls from HTTP, WebSocket sessions and the CLI are
//! serialized. Driver calls block on device I/O, so async callers go through
//! [`ControllerState::call`], which runs them on the blocking pool.
//!
//! ## Panicking Drivers
//! A driver that panics must not take the service down with it. `call`
//! catches the panic while still holding the lock, records it as a driver
//! fault and forgets the open document, so `CancelDocument` and every later
//! call keep working. A lock poisoned some other way is recovered the same
//! way on the next access.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use fiscal_core::FiscalPrinter;
use tracing::{error, warn};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct ControllerState {
    printer: Arc<Mutex<FiscalPrinter>>,
}

impl ControllerState {
    pub fn new(printer: FiscalPrinter) -> Self {
        ControllerState {
            printer: Arc::new(Mutex::new(printer)),
        }
    }

    /// Executes a function with exclusive access to the printer.
    pub fn with_printer<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut FiscalPrinter) -> R,
    {
        let mut printer = self.lock();
        f(&mut printer)
    }

    fn lock(&self) -> MutexGuard<'_, FiscalPrinter> {
        match self.printer.lock() {
            Ok(printer) => printer,
            Err(poisoned) => {
                warn!("Printer lock poisoned, recovering");
                let mut printer = poisoned.into_inner();
                printer.recover_from_panic("an earlier call panicked");
                self.printer.clear_poison();
                printer
            }
        }
    }

    /// Runs `f` on the blocking pool with exclusive access to the printer.
    pub async fn call<F, R>(&self, f: F) -> Result<R, ApiError>
    where
        F: FnOnce(&mut FiscalPrinter) -> R + Send + 'static,
        R: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut printer = state.lock();
            match panic::catch_unwind(AssertUnwindSafe(|| f(&mut printer))) {
                Ok(result) => Ok(result),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(%message, "Printer call panicked");
                    Err(ApiError::from(printer.recover_from_panic(&message)))
                }
            }
        })
        .await
        .map_err(|e| ApiError::internal(format!("Controller task failed: {}", e)))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(FiscalPrinter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscal_core::dummy::{DummyPrinter, PrinterProfile};
    use fiscal_core::{
        Buyer, ConnectParams, DocumentState, DriverConstant, DriverRegistry, DriverResult,
        FiscalDriver, IdentityDocKind, LineItem, Letter, PaymentLine, TaxCategory,
    };

    use crate::error::ErrorCode;

    /// Dummy printer whose `add_item` panics.
    struct PanickyPrinter(DummyPrinter);

    impl FiscalDriver for PanickyPrinter {
        fn brand(&self) -> &str {
            "panicky"
        }

        fn model(&self) -> &str {
            self.0.model()
        }

        fn tax_category(&self, category: TaxCategory) -> Option<DriverConstant> {
            self.0.tax_category(category)
        }

        fn identity_doc(&self, kind: IdentityDocKind) -> Option<DriverConstant> {
            self.0.identity_doc(kind)
        }

        fn cancel_any_document(&mut self) -> DriverResult<()> {
            self.0.cancel_any_document()
        }

        fn open_ticket(&mut self, letter: Option<Letter>) -> DriverResult<()> {
            self.0.open_ticket(letter)
        }

        fn open_bill_ticket(&mut self, letter: Letter, buyer: &Buyer) -> DriverResult<()> {
            self.0.open_bill_ticket(letter, buyer)
        }

        fn open_debit_note_ticket(&mut self, letter: Letter, buyer: &Buyer) -> DriverResult<()> {
            self.0.open_debit_note_ticket(letter, buyer)
        }

        fn open_credit_note_ticket(
            &mut self,
            letter: Letter,
            buyer: &Buyer,
            reference: &str,
        ) -> DriverResult<()> {
            self.0.open_credit_note_ticket(letter, buyer, reference)
        }

        fn add_item(&mut self, _item: &LineItem) -> DriverResult<()> {
            panic!("firmware table overflow");
        }

        fn add_payment(&mut self, payment: &PaymentLine) -> DriverResult<()> {
            self.0.add_payment(payment)
        }

        fn close_document(&mut self) -> DriverResult<()> {
            self.0.close_document()
        }

        fn get_last_number(&mut self, letter: Option<Letter>) -> DriverResult<u64> {
            self.0.get_last_number(letter)
        }
    }

    fn panicky_state(strict: bool) -> ControllerState {
        let mut registry = DriverRegistry::with_builtin();
        registry.register("panicky", |params, _| {
            Ok(Box::new(PanickyPrinter(DummyPrinter::new(
                PrinterProfile::epson(),
                params.model.clone(),
            ))) as Box<dyn FiscalDriver>)
        });
        ControllerState::new(FiscalPrinter::with_registry(registry, strict))
    }

    #[tokio::test]
    async fn test_call_runs_on_shared_printer() {
        let state = ControllerState::new(FiscalPrinter::new(true));
        let connected = state
            .call(|p| p.connect(&ConnectParams::new("epson", "320", "dummy")))
            .await
            .unwrap()
            .unwrap();
        assert!(connected);

        let other = state.clone();
        other
            .call(|p| p.open_document(&Default::default()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.with_printer(|p| p.state()), DocumentState::Open);
    }

    #[tokio::test]
    async fn test_driver_panic_is_recoverable() {
        let state = panicky_state(false);
        state
            .call(|p| {
                p.connect(&ConnectParams::new("panicky", "320", "dummy"))?;
                p.open_document(&Default::default())
            })
            .await
            .unwrap()
            .unwrap();

        let err = state
            .call(|p| p.add_item(&LineItem::new("Widget", 1.0, 121.0, 21.0)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DriverError);
        assert!(err.message.contains("firmware table overflow"));

        let fault = state.with_printer(|p| p.fault().cloned()).unwrap();
        assert_eq!(fault.kind, "DriverError");
        assert_eq!(state.with_printer(|p| p.state()), DocumentState::Idle);

        let cancelled = state.call(|p| p.cancel_document()).await.unwrap().unwrap();
        assert!(cancelled);
        let number = state
            .call(|p| p.query_last_number(83))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(number, 0);
        assert!(state.with_printer(|p| p.fault().is_none()));
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let state = ControllerState::new(FiscalPrinter::new(true));
        state.with_printer(|p| {
            p.connect(&ConnectParams::new("epson", "320", "dummy")).unwrap();
            p.open_document(&Default::default()).unwrap();
        });

        let poisoner = state.clone();
        let outcome = std::thread::spawn(move || {
            poisoner.with_printer(|_| panic!("boom"));
        })
        .join();
        assert!(outcome.is_err());

        assert_eq!(state.with_printer(|p| p.state()), DocumentState::Idle);
        assert!(state.with_printer(|p| p.cancel_document()).unwrap());
    }
}
