//! # RPC Calls
//!
//! The operations reachable from the transports, as one serializable enum.
//! HTTP handlers build a [`Call`] from the route; WebSocket sessions read
//! one from every frame.
//!
//! ## Frame Format
//! ```text
//! request:  {"id": 7, "method": "AddItem",
//!            "params": {"description": "Widget", "quantity": 1, "amount": 121}}
//! success:  {"id": 7, "result": true}
//! failure:  {"id": 7, "error": {"code": "INVALID_STATE", "message": "..."}}
//! ```
//!
//! `result` is `true`/`false` for document operations (permissive mode
//! answers `false` on failure), a number for `QueryLastNumber`, and the
//! property value for `GetProperty`.

use fiscal_core::{ConnectParams, DocumentRequest, FiscalPrinter, LineItem, PaymentLine, PropertyValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::state::ControllerState;

// =============================================================================
// Calls
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Call {
    Connect(ConnectParams),
    OpenDocument(DocumentRequest),
    AddItem(LineItem),
    AddPayment(PaymentLine),
    CloseDocument,
    CancelDocument,
    QueryLastNumber { document_kind: i64 },
    GetProperty { name: String },
    SetProperty { name: String, value: Value },
}

impl Call {
    /// Method name, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Call::Connect(_) => "Connect",
            Call::OpenDocument(_) => "OpenDocument",
            Call::AddItem(_) => "AddItem",
            Call::AddPayment(_) => "AddPayment",
            Call::CloseDocument => "CloseDocument",
            Call::CancelDocument => "CancelDocument",
            Call::QueryLastNumber { .. } => "QueryLastNumber",
            Call::GetProperty { .. } => "GetProperty",
            Call::SetProperty { .. } => "SetProperty",
        }
    }

    /// True for the operations answered with a success flag.
    pub fn returns_flag(&self) -> bool {
        !matches!(
            self,
            Call::QueryLastNumber { .. } | Call::GetProperty { .. }
        )
    }
}

/// Runs `call` on the printer.
pub fn execute(printer: &mut FiscalPrinter, call: Call) -> Result<Value, ApiError> {
    let result = match call {
        Call::Connect(params) => json!(printer.connect(&params)?),
        Call::OpenDocument(request) => json!(printer.open_document(&request)?),
        Call::AddItem(item) => json!(printer.add_item(&item)?),
        Call::AddPayment(payment) => json!(printer.add_payment(&payment)?),
        Call::CloseDocument => json!(printer.close_document()?),
        Call::CancelDocument => json!(printer.cancel_document()?),
        Call::QueryLastNumber { document_kind } => json!(printer.query_last_number(document_kind)?),
        Call::GetProperty { name } => json!(printer.get_property(&name)?),
        Call::SetProperty { name, value } => {
            let value = PropertyValue::from_json(value)?;
            printer.set_property(&name, &value)?;
            json!(true)
        }
    };
    Ok(result)
}

/// Runs `call` through the shared controller.
pub async fn dispatch(state: &ControllerState, call: Call) -> Result<Value, ApiError> {
    debug!(method = call.method(), "dispatching call");
    state.call(move |printer| execute(printer, call)).await?
}

// =============================================================================
// Frames
// =============================================================================

/// Reply to one request frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub id: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl Reply {
    pub fn from_result(id: Value, result: Result<Value, ApiError>) -> Self {
        match result {
            Ok(value) => Reply {
                id,
                result: Some(value),
                error: None,
            },
            Err(error) => Reply {
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// Parses a request frame into its id and call.
///
/// A frame that is valid JSON keeps its id even when the call is malformed,
/// so the caller can match the error to its request.
pub fn parse_frame(text: &str) -> (Value, Result<Call, ApiError>) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => return (Value::Null, Err(ApiError::bad_request(format!("Invalid JSON: {}", e)))),
    };
    let id = frame.get("id").cloned().unwrap_or(Value::Null);
    let call = serde_json::from_value::<Call>(frame)
        .map_err(|e| ApiError::bad_request(format!("Invalid call: {}", e)));
    (id, call)
}

/// Handles one request frame and returns the reply frame.
pub async fn handle_frame(state: &ControllerState, text: &str) -> Reply {
    let (id, call) = parse_frame(text);
    let result = match call {
        Ok(call) => dispatch(state, call).await,
        Err(e) => Err(e),
    };
    Reply::from_result(id, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn connected(strict: bool) -> FiscalPrinter {
        let mut printer = FiscalPrinter::new(strict);
        printer
            .connect(&ConnectParams::new("epson", "320", "dummy"))
            .unwrap();
        printer
    }

    #[test]
    fn test_parse_frame() {
        let (id, call) = parse_frame(
            r#"{"id": 3, "method": "AddItem", "params": {"description": "Widget", "quantity": 1, "amount": 121}}"#,
        );
        assert_eq!(id, json!(3));
        assert_eq!(call.unwrap(), Call::AddItem(LineItem::new("Widget", 1.0, 121.0, 21.0)));

        let (_, call) = parse_frame(r#"{"id": 4, "method": "CloseDocument"}"#);
        assert_eq!(call.unwrap(), Call::CloseDocument);
    }

    #[test]
    fn test_parse_frame_errors_keep_id() {
        let (id, call) = parse_frame(r#"{"id": "a", "method": "Reboot"}"#);
        assert_eq!(id, json!("a"));
        assert_eq!(call.unwrap_err().code, ErrorCode::BadRequest);

        let (id, call) = parse_frame("not json");
        assert_eq!(id, Value::Null);
        assert!(call.is_err());
    }

    #[test]
    fn test_execute_ticket() {
        let mut printer = connected(true);
        let calls = [
            Call::OpenDocument(DocumentRequest::default()),
            Call::AddItem(LineItem::new("Widget", 1.0, 121.0, 21.0)),
            Call::AddPayment(PaymentLine::new("cash", 121.0)),
            Call::CloseDocument,
        ];
        for call in calls {
            assert_eq!(execute(&mut printer, call).unwrap(), json!(true));
        }
        assert_eq!(
            execute(&mut printer, Call::QueryLastNumber { document_kind: 83 }).unwrap(),
            json!(1)
        );
    }

    #[test]
    fn test_permissive_returns_false_and_exception() {
        let mut printer = connected(false);
        assert_eq!(
            execute(&mut printer, Call::CloseDocument).unwrap(),
            json!(false)
        );
        let exception = execute(
            &mut printer,
            Call::GetProperty {
                name: "Excepcion".to_string(),
            },
        )
        .unwrap();
        assert_eq!(exception, json!("InvalidState: Cannot close document while document is idle"));
    }

    #[test]
    fn test_strict_maps_to_api_error() {
        let mut printer = connected(true);
        let err = execute(
            &mut printer,
            Call::OpenDocument(DocumentRequest {
                document_kind: 4,
                ..Default::default()
            }),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownCode);
    }

    #[test]
    fn test_set_property() {
        let mut printer = connected(false);
        let set = Call::SetProperty {
            name: "Strict".to_string(),
            value: json!(true),
        };
        assert_eq!(execute(&mut printer, set).unwrap(), json!(true));
        assert!(printer.strict());

        let err = execute(
            &mut printer,
            Call::SetProperty {
                name: "Version".to_string(),
                value: json!("2"),
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadOnlyProperty);
    }

    #[tokio::test]
    async fn test_handle_frame() {
        let state = ControllerState::new(connected(true));
        let reply = handle_frame(&state, r#"{"id": 1, "method": "CancelDocument"}"#).await;
        assert_eq!(serde_json::to_value(&reply).unwrap(), json!({"id": 1, "result": true}));

        let reply = handle_frame(
            &state,
            r#"{"id": 2, "method": "QueryLastNumber", "params": {"document_kind": 5}}"#,
        )
        .await;
        assert_eq!(reply.error.unwrap().code, ErrorCode::UnknownCode);
    }
}
