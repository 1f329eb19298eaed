// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tonerscope Probe — subnet scanning, printer classification, and status
// probing over SNMP, the embedded web UI, and ICMP.  The types it produces
// live in `tonerscope-core`.

pub mod classifier;
pub mod discovery;
pub mod monitor;
pub mod reachability;
pub mod resolver;
pub mod scanner;
pub mod snmp;
pub mod snmp_status;
pub mod web;

#[cfg(test)]
mod testing;

pub use classifier::PrinterClassifier;
pub use discovery::PrinterDiscovery;
pub use monitor::PrinterMonitor;
pub use reachability::{IcmpPinger, Pinger};
pub use resolver::{StatusProbe, StatusResolver};
pub use scanner::{ConnectProber, NetworkScanner, PortProber};
pub use snmp::{Snmp2Client, SnmpClient};
pub use snmp_status::SnmpStatusProbe;
pub use web::{HttpFetcher, ReqwestFetcher, StatusPageParser, WebProbe};
