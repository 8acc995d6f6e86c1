//! # Server
//!
//! Serves the HTTP routes and the WebSocket RPC endpoint on one listener.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  config ──► ControllerState ──► connect (configured printer)            │
//! │                                    │                                    │
//! │                                    ▼                                    │
//! │         build_router(http? + ws?) ──► TcpListener::bind                 │
//! │                                    │                                    │
//! │                                    ▼                                    │
//! │       axum::serve ... with_graceful_shutdown(Ctrl+C | SIGTERM)          │
//! │                                    │                                    │
//! │                                    ▼                                    │
//! │                         cancel any open document                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ServerSettings;
use crate::state::ControllerState;
use crate::{http, ws};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,fiscal=debug";

/// Log filter used with `--debug`.
pub const DEBUG_LOG_FILTER: &str = "debug";

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` wins over both defaults.
pub fn init_tracing(debug: bool) {
    let fallback = if debug {
        DEBUG_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Builds the router for the enabled transports.
pub fn build_router(state: ControllerState, settings: &ServerSettings) -> Router {
    let mut app = Router::new();
    if settings.http {
        app = app.merge(http::router(state.clone()));
    }
    if settings.ws {
        app = app.merge(ws::router(state));
    }
    app
}

/// Binds the configured address.
pub async fn bind(settings: &ServerSettings) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(settings.bind_address()).await?;
    info!(addr = %listener.local_addr()?, http = settings.http, ws = settings.ws, "Fiscal service listening");
    Ok(listener)
}

/// Serves until `shutdown` resolves, then cancels any open document.
pub async fn serve<F>(
    listener: TcpListener,
    state: ControllerState,
    settings: &ServerSettings,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state.clone(), settings);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    let outcome = state
        .call(|printer| {
            if printer.controller().is_connected() {
                printer.cancel_document()
            } else {
                Ok(true)
            }
        })
        .await;
    match outcome {
        Ok(Ok(true)) => info!("Server shutdown complete"),
        Ok(Ok(false)) | Ok(Err(_)) => warn!("Could not cancel the open document on shutdown"),
        Err(e) => warn!(%e, "Shutdown cleanup failed"),
    }
    Ok(())
}

/// Graceful shutdown signal handler.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
