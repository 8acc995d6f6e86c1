//! # fiscal-service: Transports and CLI
//!
//! Puts one [`fiscal_core::FiscalPrinter`] behind an HTTP API, a WebSocket
//! RPC endpoint and a command line.
//!
//! ## Modules
//!
//! - [`config`] - TOML file + environment configuration
//! - [`state`] - The shared printer (`Arc<Mutex<FiscalPrinter>>`)
//! - [`rpc`] - Call enum and frame handling shared by both transports
//! - [`http`] - One route per operation
//! - [`ws`] - WebSocket RPC sessions
//! - [`server`] - Listener, graceful shutdown, tracing setup
//! - [`cli`] - Command line (`--last`, `--test`, `--serve`)
//! - [`error`] - `ApiError` as seen by remote callers

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod rpc;
pub mod server;
pub mod state;
pub mod ws;

pub use config::FiscalConfig;
pub use error::{ApiError, ErrorCode};
pub use state::ControllerState;
