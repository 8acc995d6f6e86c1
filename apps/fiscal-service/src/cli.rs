//! # Command Line
//!
//! ```sh
//! # connect to the configured printer and report it
//! fiscal fiscal.toml
//!
//! # last ticket number (83 unless a kind is given)
//! fiscal --last
//! fiscal --last 1
//!
//! # print a test invoice B (prints a REAL fiscal document)
//! fiscal --test --yes
//!
//! # serve HTTP + WebSocket RPC
//! fiscal --serve
//! ```
//!
//! One-shot commands run in strict mode so failures exit non-zero with the
//! error message.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use fiscal_core::{DocumentRequest, FiscalPrinter, FiscalResult, LineItem, PaymentLine};
use tracing::{info, warn};

use crate::config::FiscalConfig;
use crate::server;
use crate::state::ControllerState;

pub const LICENSE: &str = "\
Fiscal printer controller
Copyright (C) the Fiscal Controller Team

This program is free software: you can redistribute it and/or modify it
under the terms of the GNU General Public License as published by the Free
Software Foundation, either version 3 of the License, or (at your option)
any later version.

This program is distributed in the hope that it will be useful, but WITHOUT
ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
FOR A PARTICULAR PURPOSE. See the GNU General Public License for details.
";

const TEST_WARNING: &str =
    "--test prints a real fiscal document on the configured printer. Do not use in production.";

/// Fiscal printer controller.
#[derive(Parser, Debug)]
#[command(
    name = "fiscal",
    version,
    about = "Prints tickets, invoices and notes on fiscal printers",
    long_about = "Prints tickets, invoices and notes on fiscal printers.\n\n\
                  Default config: ./fiscal.toml, then the platform config directory"
)]
pub struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(env = "FISCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the license and exit.
    #[arg(long)]
    pub license: bool,

    /// Print the last number issued for a document kind.
    #[arg(long, value_name = "KIND", num_args = 0..=1, default_missing_value = "83")]
    pub last: Option<i64>,

    /// Print a test invoice. Needs --yes.
    #[arg(long)]
    pub test: bool,

    /// Confirm --test.
    #[arg(long, requires = "test")]
    pub yes: bool,

    /// Serve the HTTP and WebSocket transports.
    #[arg(long, conflicts_with_all = ["last", "test"])]
    pub serve: bool,

    /// Verbose logging.
    #[arg(long)]
    pub debug: bool,
}

/// The scripted test transaction: invoice B to a CUIT holder, one item, one
/// cash payment. Returns the number the printer issued.
pub fn test_transaction(printer: &mut FiscalPrinter) -> FiscalResult<u64> {
    let request = DocumentRequest {
        document_kind: 6,
        tax_category: 5,
        identity_doc_kind: 80,
        identity_doc_number: "20267565393".to_string(),
        buyer_name: "Joao Da Silva".to_string(),
        buyer_address: "Rua 76 km 34.5 Alagoas".to_string(),
        reference: None,
    };

    printer.open_document(&request)?;
    printer.add_item(&LineItem::new("Descripcion del producto P0001", 1.0, 121.0, 21.0))?;
    printer.add_payment(&PaymentLine::new("efectivo", 121.0))?;
    printer.close_document()?;
    printer.query_last_number(request.document_kind)
}

/// Runs the command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.license {
        println!("{}", LICENSE);
        return Ok(());
    }

    let config = FiscalConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    server::init_tracing(cli.debug);

    if cli.serve {
        return serve(config).await;
    }

    if cli.test && !cli.yes {
        eprintln!("{}", TEST_WARNING);
        bail!("refusing to print without --yes");
    }

    let state = ControllerState::new(FiscalPrinter::new(true));
    let params = config.controller.connect_params();
    state
        .call(move |printer| printer.connect(&params))
        .await??;
    println!(
        "Connected to {} {} on {}",
        config.controller.brand, config.controller.model, config.controller.port
    );

    if let Some(kind) = cli.last {
        let number = state
            .call(move |printer| printer.query_last_number(kind))
            .await??;
        println!("Last number for document kind {}: {}", kind, number);
    }

    if cli.test {
        eprintln!("{}", TEST_WARNING);
        let number = state.call(test_transaction).await??;
        println!("Test invoice printed, number {}", number);
    }

    Ok(())
}

async fn serve(config: FiscalConfig) -> anyhow::Result<()> {
    let state = ControllerState::new(FiscalPrinter::new(config.controller.strict));

    let params = config.controller.connect_params();
    let connected = state
        .call(move |printer| printer.connect(&params))
        .await?;
    match connected {
        Ok(true) => info!(brand = %config.controller.brand, "Configured printer connected"),
        // callers can still POST /connect
        Ok(false) | Err(_) => warn!("Configured printer not connected at startup"),
    }

    let listener = server::bind(&config.server)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind_address()))?;
    server::serve(listener, state, &config.server, server::shutdown_signal()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use fiscal_core::{ConnectParams, DEFAULT_DOCUMENT_KIND};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_last_defaults_to_ticket() {
        let cli = Cli::try_parse_from(["fiscal", "--last"]).unwrap();
        assert_eq!(cli.last, Some(DEFAULT_DOCUMENT_KIND));

        let cli = Cli::try_parse_from(["fiscal", "fiscal.toml", "--last", "1"]).unwrap();
        assert_eq!(cli.last, Some(1));
        assert_eq!(cli.config, Some(PathBuf::from("fiscal.toml")));
    }

    #[test]
    fn test_yes_requires_test() {
        assert!(Cli::try_parse_from(["fiscal", "--yes"]).is_err());
        assert!(Cli::try_parse_from(["fiscal", "--serve", "--test"]).is_err());
    }

    #[test]
    fn test_transaction_on_dummy() {
        let mut printer = FiscalPrinter::new(true);
        printer
            .connect(&ConnectParams::new("hasar", "615", "dummy"))
            .unwrap();
        assert_eq!(test_transaction(&mut printer).unwrap(), 1);
        assert_eq!(test_transaction(&mut printer).unwrap(), 2);
    }
}
