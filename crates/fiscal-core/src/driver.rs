//! # Driver Capability Interface
//!
//! The contract every fiscal printer driver implements. Drivers own the
//! vendor wire protocol (framing, checksums, hardware retries); the
//! controller only ever calls these methods.
//!
//! ## Call Sequence For One Document
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Controller                         FiscalDriver                        │
//! │  ──────────                         ────────────                        │
//! │  open_document ────────────────────► cancel_any_document()              │
//! │                 ───────────────────► open_ticket | open_bill_ticket |   │
//! │                                      open_debit_note_ticket |           │
//! │                                      open_credit_note_ticket            │
//! │  add_item ─────────────────────────► add_item(item)         (n times)  │
//! │  add_payment ──────────────────────► add_payment(payment)   (m times)  │
//! │  close_document ───────────────────► close_document()                   │
//! │                                                                         │
//! │  query_last_number ────────────────► get_last_number(letter?)  any time │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call is blocking request/response. Timeouts belong to the driver's
//! own transport.

use serde::{Deserialize, Serialize};

use crate::codes::{IdentityDocKind, TaxCategory};
use crate::error::{DriverResult, FiscalError, FiscalResult};
use crate::types::{Buyer, DriverConstant, Letter, LineItem, PaymentLine};

/// Port name that selects the in-memory dummy device.
pub const DUMMY_PORT: &str = "dummy";

/// Default serial line speed.
pub const DEFAULT_SPEED: u32 = 9600;

// =============================================================================
// Driver Trait
// =============================================================================

/// Operations a fiscal printer driver must provide.
///
/// Which `open_*` entry point gets called is decided by the controller from
/// the document kind; drivers never choose.
pub trait FiscalDriver: Send {
    /// Brand this driver speaks for ("epson", "hasar", ...).
    fn brand(&self) -> &str;

    /// Printer model.
    fn model(&self) -> &str;

    /// The driver's constant for a buyer tax category, if it supports one.
    fn tax_category(&self, category: TaxCategory) -> Option<DriverConstant>;

    /// The driver's constant for an identity document kind, if supported.
    fn identity_doc(&self, kind: IdentityDocKind) -> Option<DriverConstant>;

    /// Forces the printer back to idle, whatever it was doing.
    fn cancel_any_document(&mut self) -> DriverResult<()>;

    /// Opens a ticket. `None` means no letter applies.
    fn open_ticket(&mut self, letter: Option<Letter>) -> DriverResult<()>;

    /// Opens an invoice (or ticket-invoice).
    fn open_bill_ticket(&mut self, letter: Letter, buyer: &Buyer) -> DriverResult<()>;

    /// Opens a debit note.
    fn open_debit_note_ticket(&mut self, letter: Letter, buyer: &Buyer) -> DriverResult<()>;

    /// Opens a credit note referring to an earlier document.
    fn open_credit_note_ticket(
        &mut self,
        letter: Letter,
        buyer: &Buyer,
        reference: &str,
    ) -> DriverResult<()>;

    /// Prints a line item.
    fn add_item(&mut self, item: &LineItem) -> DriverResult<()>;

    /// Prints a payment line.
    fn add_payment(&mut self, payment: &PaymentLine) -> DriverResult<()>;

    /// Closes the current document.
    fn close_document(&mut self) -> DriverResult<()>;

    /// Last number issued for a letter (`None` for tickets).
    fn get_last_number(&mut self, letter: Option<Letter>) -> DriverResult<u64>;
}

impl std::fmt::Debug for dyn FiscalDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FiscalDriver({} {})", self.brand(), self.model())
    }
}

// =============================================================================
// Connection Parameters
// =============================================================================

/// How the driver reaches the printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Addressing {
    /// No hardware: the in-memory dummy device.
    Dummy,
    /// Serial device (COM1, /dev/ttyS0, ...).
    Serial { device: String, speed: u32 },
    /// TCP proxy in front of the printer.
    Tcp { host: String, port: u16 },
}

/// Arguments of `connect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectParams {
    /// Driver brand, the registry key.
    pub brand: String,

    /// Printer model, passed to the driver.
    pub model: String,

    /// Serial device name, TCP port number (when `host` is set) or `"dummy"`.
    pub port: String,

    /// Remote host of a TCP proxy. Empty or absent selects serial.
    #[serde(default)]
    pub host: Option<String>,

    /// Serial line speed.
    #[serde(default = "default_speed")]
    pub speed: u32,
}

fn default_speed() -> u32 {
    DEFAULT_SPEED
}

impl ConnectParams {
    /// Creates serial connection parameters at the default speed.
    pub fn new(brand: impl Into<String>, model: impl Into<String>, port: impl Into<String>) -> Self {
        ConnectParams {
            brand: brand.into(),
            model: model.into(),
            port: port.into(),
            host: None,
            speed: DEFAULT_SPEED,
        }
    }

    /// Switches to TCP addressing through `host`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the serial speed.
    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    /// Works out the addressing mode.
    ///
    /// ## Rules
    /// - port `"dummy"` → [`Addressing::Dummy`]
    /// - no host (or an empty one) → serial on `port`
    /// - host given → TCP, with `port` parsed as the port number
    pub fn addressing(&self) -> FiscalResult<Addressing> {
        if self.port == DUMMY_PORT {
            return Ok(Addressing::Dummy);
        }

        match self.host.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
            None => Ok(Addressing::Serial {
                device: self.port.clone(),
                speed: self.speed,
            }),
            Some(host) => {
                let port = self.port.trim().parse::<u16>().map_err(|_| {
                    FiscalError::Configuration(format!(
                        "TCP port must be a number, got '{}'",
                        self.port
                    ))
                })?;
                Ok(Addressing::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_addressing() {
        let params = ConnectParams::new("epson", "320", "COM2").with_speed(19200);
        assert_eq!(
            params.addressing().unwrap(),
            Addressing::Serial {
                device: "COM2".to_string(),
                speed: 19200
            }
        );
    }

    #[test]
    fn test_empty_host_means_serial() {
        let params = ConnectParams::new("epson", "320", "/dev/ttyS0").with_host("  ");
        assert!(matches!(params.addressing().unwrap(), Addressing::Serial { .. }));
    }

    #[test]
    fn test_tcp_addressing() {
        let params = ConnectParams::new("hasar", "615", "1600").with_host("10.0.0.5");
        assert_eq!(
            params.addressing().unwrap(),
            Addressing::Tcp {
                host: "10.0.0.5".to_string(),
                port: 1600
            }
        );
    }

    #[test]
    fn test_tcp_port_must_be_numeric() {
        let params = ConnectParams::new("hasar", "615", "COM1").with_host("10.0.0.5");
        assert!(matches!(
            params.addressing(),
            Err(FiscalError::Configuration(_))
        ));
    }

    #[test]
    fn test_dummy_port_wins() {
        let params = ConnectParams::new("epson", "320", DUMMY_PORT).with_host("10.0.0.5");
        assert_eq!(params.addressing().unwrap(), Addressing::Dummy);
    }

    #[test]
    fn test_params_deserialize_defaults() {
        let params: ConnectParams =
            serde_json::from_str(r#"{"brand":"epson","model":"320","port":"dummy"}"#).unwrap();
        assert_eq!(params.speed, DEFAULT_SPEED);
        assert_eq!(params.host, None);
    }
}
