//! # WebSocket RPC Binding
//!
//! Session-style access to the controller: one socket, many calls.
//!
//! ## Session Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  client                                 /rpc handler                    │
//! │  ──────                                 ────────────                    │
//! │  upgrade ─────────────────────────────► split socket                    │
//! │  {"id":1,"method":"Connect",...} ─────► dispatch ──► ControllerState   │
//! │                              ◄───────── {"id":1,"result":true}          │
//! │  {"id":2,"method":"Nope"} ────────────► parse error                     │
//! │                              ◄───────── {"id":2,"error":{...}}          │
//! │  close ───────────────────────────────► session ends                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Text and binary frames both carry UTF-8 JSON. A binary frame that is not
//! valid UTF-8 is refused with `BAD_REQUEST` rather than decoded lossily.
//!
//! Frames of one session are handled in order. Sessions share the printer,
//! so calls from different sessions interleave at operation granularity.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::rpc::{self, Reply};
use crate::state::ControllerState;

/// Maximum frame size (64KB).
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Builds the `/rpc` route.
pub fn router(state: ControllerState) -> Router {
    Router::new()
        .route("/rpc", get(ws_handler))
        .with_state(state)
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ControllerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    info!(addr = %addr, "New RPC session");
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Handles one RPC session.
async fn handle_socket(socket: WebSocket, state: ControllerState, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let reply = match msg {
            Ok(Message::Text(text)) => rpc::handle_frame(&state, text.as_str()).await,
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => rpc::handle_frame(&state, &text).await,
                // the id is inside the undecodable payload
                Err(e) => Reply::from_result(
                    Value::Null,
                    Err(ApiError::bad_request(format!(
                        "Binary frame is not valid UTF-8: {}",
                        e
                    ))),
                ),
            },
            Ok(Message::Ping(data)) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    break;
                }
                continue;
            }
            Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                info!(addr = %addr, "Client requested close");
                break;
            }
            Err(e) => {
                warn!(addr = %addr, ?e, "WebSocket error");
                break;
            }
        };

        if let Some(error) = &reply.error {
            debug!(addr = %addr, code = ?error.code, "RPC call failed");
        }

        let json = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(e) => {
                warn!(addr = %addr, ?e, "Failed to serialize reply");
                continue;
            }
        };
        if let Err(e) = sender.send(Message::Text(json.into())).await {
            warn!(addr = %addr, ?e, "Failed to send reply");
            break;
        }
    }

    info!(addr = %addr, "RPC session closed");
}
