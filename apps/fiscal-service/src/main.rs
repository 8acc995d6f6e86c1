//! Fiscal printer controller: command line and service entry point.
//!
//! ```sh
//! fiscal --serve              # HTTP + WebSocket RPC on 127.0.0.1:8770
//! fiscal --last 6             # last invoice B number
//! ```

use clap::Parser;

use fiscal_service::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run(Cli::parse()).await
}
