//! # HTTP Binding
//!
//! One route per controller operation.
//!
//! | Method | Path                              | Body            | Answer            |
//! |--------|-----------------------------------|-----------------|-------------------|
//! | POST   | `/connect`                        | ConnectParams   | `{"ok": bool}`    |
//! | POST   | `/documents`                      | DocumentRequest | `{"ok": bool}`    |
//! | POST   | `/documents/items`                | LineItem        | `{"ok": bool}`    |
//! | POST   | `/documents/payments`             | PaymentLine     | `{"ok": bool}`    |
//! | POST   | `/documents/close`                |                 | `{"ok": bool}`    |
//! | POST   | `/documents/cancel`               |                 | `{"ok": bool}`    |
//! | GET    | `/documents/last-number/{kind}`   |                 | `{"value": n}`    |
//! | GET    | `/properties/{name}`              |                 | `{"value": v}`    |
//! | PUT    | `/properties/{name}`              | `{"value": v}`  | `{"ok": true}`    |
//! | GET    | `/health`                         |                 | `OK`              |
//!
//! Strict-mode failures answer with an [`ApiError`] body and its status code.
//! Malformed bodies and path segments answer `BAD_REQUEST` with the same body.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fiscal_core::{ConnectParams, DocumentRequest, LineItem, PaymentLine};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::rpc::{self, Call};
use crate::state::ControllerState;

/// Builds the HTTP routes.
pub fn router(state: ControllerState) -> Router {
    Router::new()
        .route("/connect", post(connect))
        .route("/documents", post(open_document))
        .route("/documents/items", post(add_item))
        .route("/documents/payments", post(add_payment))
        .route("/documents/close", post(close_document))
        .route("/documents/cancel", post(cancel_document))
        .route("/documents/last-number/{kind}", get(last_number))
        .route("/properties/{name}", get(get_property).put(set_property))
        .route("/health", get(health))
        .with_state(state)
}

/// Body of `PUT /properties/{name}`.
#[derive(Debug, Deserialize)]
struct PropertyBody {
    value: Value,
}

async fn run(state: &ControllerState, call: Call) -> Result<Json<Value>, ApiError> {
    let flag = call.returns_flag();
    let result = rpc::dispatch(state, call).await?;
    Ok(Json(if flag {
        json!({ "ok": result })
    } else {
        json!({ "value": result })
    }))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

async fn connect(
    State(state): State<ControllerState>,
    payload: Result<Json<ConnectParams>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Call::Connect(body(payload)?)).await
}

async fn open_document(
    State(state): State<ControllerState>,
    payload: Result<Json<DocumentRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Call::OpenDocument(body(payload)?)).await
}

async fn add_item(
    State(state): State<ControllerState>,
    payload: Result<Json<LineItem>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Call::AddItem(body(payload)?)).await
}

async fn add_payment(
    State(state): State<ControllerState>,
    payload: Result<Json<PaymentLine>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Call::AddPayment(body(payload)?)).await
}

async fn close_document(State(state): State<ControllerState>) -> Result<Json<Value>, ApiError> {
    run(&state, Call::CloseDocument).await
}

async fn cancel_document(State(state): State<ControllerState>) -> Result<Json<Value>, ApiError> {
    run(&state, Call::CancelDocument).await
}

async fn last_number(
    State(state): State<ControllerState>,
    kind: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(kind) = kind.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    run(&state, Call::QueryLastNumber { document_kind: kind }).await
}

async fn get_property(
    State(state): State<ControllerState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Call::GetProperty { name }).await
}

async fn set_property(
    State(state): State<ControllerState>,
    Path(name): Path<String>,
    payload: Result<Json<PropertyBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let PropertyBody { value } = body(payload)?;
    run(&state, Call::SetProperty { name, value }).await
}

async fn health() -> impl IntoResponse {
    "OK"
}
