//! # Driver Registry
//!
//! Maps a brand name to a driver constructor. `connect` looks the brand up
//! here; an unknown brand is a configuration error right away.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "epson" ──► builtin: DummyPrinter(PrinterProfile::epson())            │
//! │  "hasar" ──► builtin: DummyPrinter(PrinterProfile::hasar())            │
//! │  "acme"  ──► registry.register("acme", |params, addressing| ...)       │
//! │  other   ──► FiscalError::Configuration                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The built-in brands only provide the dummy device. Real hardware needs a
//! vendor driver registered under the same brand, which replaces the
//! built-in entry.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::driver::{Addressing, ConnectParams, FiscalDriver};
use crate::dummy::{DummyPrinter, PrinterProfile};
use crate::error::{FiscalError, FiscalResult};

/// Constructs a driver for validated connection parameters.
pub type DriverFactory =
    Box<dyn Fn(&ConnectParams, &Addressing) -> FiscalResult<Box<dyn FiscalDriver>> + Send + Sync>;

/// Brand → driver constructor table.
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("brands", &self.brands())
            .finish()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl DriverRegistry {
    /// Creates a registry with no brands.
    pub fn empty() -> Self {
        DriverRegistry {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in `epson` and `hasar` brands.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("epson", |params, addressing| {
            dummy_only(PrinterProfile::epson(), params, addressing)
        });
        registry.register("hasar", |params, addressing| {
            dummy_only(PrinterProfile::hasar(), params, addressing)
        });
        registry
    }

    /// Registers (or replaces) the constructor for a brand.
    ///
    /// Brand names are case-insensitive.
    pub fn register<F>(&mut self, brand: &str, factory: F)
    where
        F: Fn(&ConnectParams, &Addressing) -> FiscalResult<Box<dyn FiscalDriver>>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(brand.to_lowercase(), Box::new(factory));
    }

    /// Registered brand names, sorted.
    pub fn brands(&self) -> Vec<String> {
        let mut brands: Vec<String> = self.factories.keys().cloned().collect();
        brands.sort();
        brands
    }

    /// Builds the driver for `params`.
    ///
    /// ## Errors
    /// - `Configuration` for an unknown brand or invalid addressing
    /// - whatever the brand's factory returns
    pub fn create(&self, params: &ConnectParams) -> FiscalResult<Box<dyn FiscalDriver>> {
        let factory = self
            .factories
            .get(&params.brand.to_lowercase())
            .ok_or_else(|| {
                FiscalError::Configuration(format!(
                    "Unknown printer brand '{}'. Registered brands: {}",
                    params.brand,
                    self.brands().join(", ")
                ))
            })?;

        let addressing = params.addressing()?;
        debug!(brand = %params.brand, model = %params.model, ?addressing, "creating driver");
        factory(params, &addressing)
    }
}

fn dummy_only(
    profile: PrinterProfile,
    params: &ConnectParams,
    addressing: &Addressing,
) -> FiscalResult<Box<dyn FiscalDriver>> {
    match addressing {
        Addressing::Dummy => Ok(Box::new(DummyPrinter::new(profile, params.model.clone()))),
        other => Err(FiscalError::Configuration(format!(
            "No {} device driver linked for {:?}; register a vendor driver for this brand",
            profile.brand, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_brands() {
        let registry = DriverRegistry::with_builtin();
        assert_eq!(registry.brands(), vec!["epson", "hasar"]);

        let driver = registry
            .create(&ConnectParams::new("EPSON", "320", "dummy"))
            .unwrap();
        assert_eq!(driver.brand(), "epson");
        assert_eq!(driver.model(), "320");
    }

    #[test]
    fn test_unknown_brand_is_configuration_error() {
        let registry = DriverRegistry::with_builtin();
        let err = registry
            .create(&ConnectParams::new("olivetti", "1", "dummy"))
            .err()
            .unwrap();
        assert!(matches!(err, FiscalError::Configuration(ref m) if m.contains("olivetti")));
    }

    #[test]
    fn test_builtin_brand_refuses_real_port() {
        let registry = DriverRegistry::with_builtin();
        let err = registry
            .create(&ConnectParams::new("hasar", "615", "COM1"))
            .err()
            .unwrap();
        assert!(matches!(err, FiscalError::Configuration(_)));
    }

    #[test]
    fn test_registered_factory_receives_addressing() {
        let mut registry = DriverRegistry::empty();
        registry.register("acme", |params, addressing| match addressing {
            Addressing::Tcp { port: 1600, .. } => Ok(Box::new(DummyPrinter::new(
                PrinterProfile::epson(),
                params.model.clone(),
            )) as Box<dyn FiscalDriver>),
            other => Err(FiscalError::Configuration(format!("unexpected {:?}", other))),
        });

        let params = ConnectParams::new("acme", "x1", "1600").with_host("proxy.local");
        assert!(registry.create(&params).is_ok());
    }
}
