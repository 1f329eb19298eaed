// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tonerscope — network printer discovery and status
//
// Entry point. Initialises logging, loads the probe configuration, runs one
// command and prints its result as JSON on stdout. Logs go to stderr.

mod commands;

use std::collections::HashSet;
use std::process::ExitCode;

use serde::Serialize;

use tonerscope_core::config::ProbeConfig;
use tonerscope_core::error::Result;
use tonerscope_probe::PrinterMonitor;

use commands::{CommandLine, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = CommandLine::parse_args();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: CommandLine) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };
    let monitor = PrinterMonitor::new(config)?;
    let community = cli.community.as_deref();

    match cli.command {
        Commands::Scan { cidr } => print_json(&monitor.scan_subnet(&cidr).await?),
        Commands::Discover { cidr, known } => {
            let known: HashSet<_> = known.into_iter().collect();
            print_json(&monitor.discover_printers(&cidr, &known, community).await?)
        }
        Commands::Classify { address } => {
            let model = monitor.classify_as_printer(&address, community).await?;
            print_json(&serde_json::json!({ "address": address, "model": model }))
        }
        Commands::Status { address, mode } => {
            print_json(&monitor.get_status(&address, &mode, community).await?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
