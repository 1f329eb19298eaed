// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tonerscope")]
#[command(about = "Find network printers and read their toner levels and alerts.")]
#[command(version)]
pub struct CommandLine {
    /// JSON configuration file; built-in defaults otherwise.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// SNMP community, overriding the configured default.
    #[arg(long, global = true)]
    pub community: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List hosts with open printer ports (80, 161, 443, 9100)
    #[command(alias = "s")]
    Scan { cidr: String },
    /// Scan and classify, reporting new printers with a suggested mode
    #[command(alias = "d")]
    Discover {
        cidr: String,
        /// Addresses already on record; skipped
        #[arg(long = "known", value_delimiter = ',')]
        known: Vec<IpAddr>,
    },
    /// Decide whether one host is a printer
    #[command(alias = "c")]
    Classify { address: String },
    /// Read supplies and alerts through the fallback chain
    #[command(alias = "st")]
    Status {
        address: String,
        /// Primary method: snmp, web or ping
        #[arg(long, short, default_value = "snmp")]
        mode: String,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
