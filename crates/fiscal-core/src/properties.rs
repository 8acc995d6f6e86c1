//! # Named Properties
//!
//! Read/write access to controller attributes by name, for hosts that
//! cannot call typed accessors.
//!
//! | Name          | Aliases            | Access     | Value                 |
//! |---------------|--------------------|------------|-----------------------|
//! | `Version`     |                    | read       | crate version         |
//! | `Exception`   | `Excepcion`        | read       | `<kind>: <summary>`   |
//! | `Traceback`   |                    | read       | last fault trace      |
//! | `Strict`      | `LanzarExcepciones`| read/write | re-raise on failure   |
//! | `DebugLog`    |                    | read       | controller journal    |
//!
//! Names are case-insensitive. `Exception` and `Traceback` read as empty
//! text when the last operation succeeded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::printer::FiscalPrinter;

/// Crate version reported by the `Version` property.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Property Names
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    Version,
    Exception,
    Traceback,
    Strict,
    DebugLog,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Version,
        Property::Exception,
        Property::Traceback,
        Property::Strict,
        Property::DebugLog,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Property::Version => "Version",
            Property::Exception => "Exception",
            Property::Traceback => "Traceback",
            Property::Strict => "Strict",
            Property::DebugLog => "DebugLog",
        }
    }

    pub fn is_writable(self) -> bool {
        accessor(self).set.is_some()
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Property {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "version" => Ok(Property::Version),
            "exception" | "excepcion" => Ok(Property::Exception),
            "traceback" => Ok(Property::Traceback),
            "strict" | "lanzarexcepciones" => Ok(Property::Strict),
            "debuglog" => Ok(Property::DebugLog),
            _ => Err(PropertyError::Unknown(s.to_string())),
        }
    }
}

// =============================================================================
// Values and Errors
// =============================================================================

/// Value of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Text(String),
}

impl PropertyValue {
    /// Converts a JSON value coming from a transport.
    pub fn from_json(value: serde_json::Value) -> Result<Self, PropertyError> {
        match value {
            serde_json::Value::Bool(flag) => Ok(PropertyValue::Flag(flag)),
            serde_json::Value::String(text) => Ok(PropertyValue::Text(text)),
            other => Err(PropertyError::InvalidValue {
                property: "(any)".to_string(),
                reason: format!("expected a string or a boolean, got {}", other),
            }),
        }
    }

    /// Reads the value as a flag. Accepts booleans and the usual spellings.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(flag) => Some(*flag),
            PropertyValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Flag(flag) => write!(f, "{}", flag),
            PropertyValue::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("Unknown property: {0}")]
    Unknown(String),

    #[error("Property {0} is read-only")]
    ReadOnly(Property),

    #[error("Invalid value for {property}: {reason}")]
    InvalidValue { property: String, reason: String },
}

// =============================================================================
// Accessor Table
// =============================================================================

type Getter = fn(&FiscalPrinter) -> PropertyValue;
type Setter = fn(&mut FiscalPrinter, &PropertyValue) -> Result<(), PropertyError>;

struct Accessor {
    get: Getter,
    set: Option<Setter>,
}

fn accessor(property: Property) -> Accessor {
    match property {
        Property::Version => Accessor {
            get: |_| PropertyValue::Text(VERSION.to_string()),
            set: None,
        },
        Property::Exception => Accessor {
            get: |printer| {
                PropertyValue::Text(
                    printer
                        .fault()
                        .map(|f| format!("{}: {}", f.kind, f.summary))
                        .unwrap_or_default(),
                )
            },
            set: None,
        },
        Property::Traceback => Accessor {
            get: |printer| {
                PropertyValue::Text(printer.fault().map(|f| f.trace.clone()).unwrap_or_default())
            },
            set: None,
        },
        Property::Strict => Accessor {
            get: |printer| PropertyValue::Flag(printer.strict()),
            set: Some(|printer, value| {
                let strict = value.as_flag().ok_or_else(|| PropertyError::InvalidValue {
                    property: Property::Strict.to_string(),
                    reason: format!("expected a boolean, got '{}'", value),
                })?;
                printer.set_strict(strict);
                Ok(())
            }),
        },
        Property::DebugLog => Accessor {
            get: |printer| PropertyValue::Text(printer.controller().debug_log().render()),
            set: None,
        },
    }
}

/// Reads `property` from `printer`.
pub fn get(printer: &FiscalPrinter, property: Property) -> PropertyValue {
    (accessor(property).get)(printer)
}

/// Writes `property` on `printer`.
pub fn set(
    printer: &mut FiscalPrinter,
    property: Property,
    value: &PropertyValue,
) -> Result<(), PropertyError> {
    match accessor(property).set {
        Some(setter) => setter(printer, value),
        None => Err(PropertyError::ReadOnly(property)),
    }
}
