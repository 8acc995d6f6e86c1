//! # Fault Envelope
//!
//! Wraps every externally invoked operation so that a failure is captured
//! instead of escaping to the caller unannounced.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run(op, f)                                                             │
//! │    │                                                                    │
//! │    ├── clear last fault                                                 │
//! │    ├── f() ── Ok(v) ─────────────────────────────► Ok(Some(v))          │
//! │    │                                                                    │
//! │    └── f() ── Err(e) ── record FaultRecord ──┬── strict ──► Err(e)      │
//! │                                              └── permissive ► Ok(None) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Permissive mode exists for hosts that cannot receive errors and poll the
//! `Exception`/`Traceback` properties instead.

use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::{FiscalError, FiscalResult};

/// Description of the last failed operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    /// Operation that failed ("open_document", ...).
    pub operation: String,

    /// Error kind, see [`FiscalError::kind`].
    pub kind: String,

    /// One-line message.
    pub summary: String,

    /// Kind, message and the chain of underlying causes.
    pub trace: String,

    /// When the failure happened.
    pub captured_at: DateTime<Utc>,
}

impl FaultRecord {
    /// Captures `error` raised by `operation`.
    pub fn capture(operation: &str, error: &FiscalError) -> Self {
        let mut trace = format!("{} in {}: {}", error.kind(), operation, error);
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }

        FaultRecord {
            operation: operation.to_string(),
            kind: error.kind().to_string(),
            summary: error.to_string(),
            trace,
            captured_at: Utc::now(),
        }
    }
}

/// Fault capture state plus the strict/permissive switch.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    fault: Option<FaultRecord>,
    strict: bool,
}

impl Envelope {
    /// Creates an envelope. `strict` re-raises failures after recording them.
    pub fn new(strict: bool) -> Self {
        Envelope {
            fault: None,
            strict,
        }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Last captured fault, cleared at the start of every `run`.
    pub fn fault(&self) -> Option<&FaultRecord> {
        self.fault.as_ref()
    }

    /// Records a failure that happened outside `run`.
    pub fn record(&mut self, operation: &str, error: &FiscalError) {
        let record = FaultRecord::capture(operation, error);
        warn!(operation, kind = %record.kind, "operation aborted: {}", record.summary);
        self.fault = Some(record);
    }

    /// Runs `f` as `operation`.
    ///
    /// Returns `Ok(None)` for a failure swallowed in permissive mode.
    pub fn run<T, F>(&mut self, operation: &str, f: F) -> FiscalResult<Option<T>>
    where
        F: FnOnce() -> FiscalResult<T>,
    {
        self.fault = None;
        match f() {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                let record = FaultRecord::capture(operation, &error);
                warn!(
                    operation,
                    kind = %record.kind,
                    strict = self.strict,
                    "operation failed: {}",
                    record.summary
                );
                self.fault = Some(record);
                if self.strict {
                    Err(error)
                } else {
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;

    #[derive(Debug, thiserror::Error)]
    #[error("port COM9 not found")]
    struct PortMissing;

    #[test]
    fn test_success_clears_previous_fault() {
        let mut envelope = Envelope::new(false);
        let _ = envelope.run("close_document", || -> FiscalResult<()> {
            Err(FiscalError::NotConnected)
        });
        assert!(envelope.fault().is_some());

        assert_eq!(envelope.run("close_document", || Ok(7)).unwrap(), Some(7));
        assert!(envelope.fault().is_none());
    }

    #[test]
    fn test_permissive_swallows() {
        let mut envelope = Envelope::new(false);
        let result = envelope.run("add_item", || -> FiscalResult<()> {
            Err(FiscalError::NotConnected)
        });
        assert!(matches!(result, Ok(None)));

        let fault = envelope.fault().unwrap();
        assert_eq!(fault.operation, "add_item");
        assert_eq!(fault.kind, "NotConnected");
    }

    #[test]
    fn test_strict_reraises_after_recording() {
        let mut envelope = Envelope::new(true);
        let result = envelope.run("connect", || -> FiscalResult<()> {
            Err(FiscalError::Configuration("bad port".to_string()))
        });
        assert!(matches!(result, Err(FiscalError::Configuration(_))));
        assert_eq!(envelope.fault().unwrap().kind, "ConfigurationError");
    }

    #[test]
    fn test_trace_walks_cause_chain() {
        let error: FiscalError = DriverError::new("epson", "open failed")
            .with_source(PortMissing)
            .into();
        let record = FaultRecord::capture("connect", &error);

        assert!(record.trace.starts_with("DriverError in connect:"));
        assert!(record.trace.contains("caused by: port COM9 not found"));
        assert_eq!(record.summary, "epson driver error: open failed");
    }
}
