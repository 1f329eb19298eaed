// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer discovery: sweep a subnet, then classify every live host.
//
// Hosts the caller already knows about are skipped before any SNMP traffic
// is sent to them. Each new printer comes with a suggested connection mode:
// SNMP when the agent answered on 161, the web UI otherwise.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use tonerscope_core::error::Result;
use tonerscope_core::types::{ConnectionMode, Device, DiscoveredPrinter};

use crate::classifier::PrinterClassifier;
use crate::scanner::NetworkScanner;
use crate::snmp::SNMP_PORT;

/// Scan-then-classify sweep.
pub struct PrinterDiscovery {
    scanner: Arc<NetworkScanner>,
    classifier: Arc<PrinterClassifier>,
    /// Hosts classified at the same time.
    concurrency: usize,
}

impl PrinterDiscovery {
    pub fn new(
        scanner: Arc<NetworkScanner>,
        classifier: Arc<PrinterClassifier>,
        concurrency: usize,
    ) -> Self {
        Self {
            scanner,
            classifier,
            concurrency: concurrency.max(1),
        }
    }

    /// Printers in `subnet` that are not already in `known`, by address.
    pub async fn discover(
        &self,
        subnet: &str,
        known: &HashSet<IpAddr>,
        community: &str,
    ) -> Result<Vec<DiscoveredPrinter>> {
        let devices = self.scanner.scan(subnet).await?;
        let fresh: Vec<Device> = devices
            .into_iter()
            .filter(|d| {
                let seen = known.contains(&d.address);
                if seen {
                    debug!(addr = %d.address, "already known, skipping");
                }
                !seen
            })
            .collect();

        let mut printers: Vec<DiscoveredPrinter> = stream::iter(fresh)
            .map(|device| self.identify(device, community))
            .buffer_unordered(self.concurrency)
            .filter_map(|found| async move { found })
            .collect()
            .await;
        printers.sort_by_key(|p| p.address);

        info!(subnet, printers = printers.len(), "discovery complete");
        Ok(printers)
    }

    async fn identify(&self, device: Device, community: &str) -> Option<DiscoveredPrinter> {
        let model = self.classifier.classify(device.address, community).await?;
        let suggested_mode = suggested_mode(&device);
        info!(addr = %device.address, model = %model, mode = %suggested_mode, "printer found");
        Some(DiscoveredPrinter {
            address: device.address,
            ports: device.ports,
            model,
            suggested_mode,
        })
    }
}

/// SNMP when the agent answered during the scan, the web UI otherwise.
pub fn suggested_mode(device: &Device) -> ConnectionMode {
    if device.has_port(SNMP_PORT) {
        ConnectionMode::Snmp
    } else {
        ConnectionMode::Web
    }
}
