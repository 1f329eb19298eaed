// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Entry point for the layer that owns printer records.
//
// Takes addresses and modes as the strings that layer stores, validates
// them, and wires the scanner, classifier and resolver to the real network
// clients built from one `ProbeConfig`.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use tonerscope_core::config::ProbeConfig;
use tonerscope_core::error::{Result, TonerscopeError};
use tonerscope_core::types::{Device, DiscoveredPrinter, PrinterStatus};

use crate::classifier::PrinterClassifier;
use crate::discovery::PrinterDiscovery;
use crate::reachability::{IcmpPinger, Pinger};
use crate::resolver::StatusResolver;
use crate::scanner::{ConnectProber, NetworkScanner, PortProber};
use crate::snmp::{Snmp2Client, SnmpClient};
use crate::snmp_status::SnmpStatusProbe;
use crate::web::{HttpFetcher, ReqwestFetcher, WebProbe};

/// Scan, classify and status operations over shared components.
pub struct PrinterMonitor {
    config: ProbeConfig,
    scanner: Arc<NetworkScanner>,
    classifier: Arc<PrinterClassifier>,
    resolver: StatusResolver,
    discovery: PrinterDiscovery,
}

impl PrinterMonitor {
    /// Build against the real network.
    pub fn new(config: ProbeConfig) -> Result<Self> {
        config.validate()?;
        let snmp: Arc<dyn SnmpClient> = Arc::new(Snmp2Client::new(&config));
        let http: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(&config)?);
        let pinger: Arc<dyn Pinger> = Arc::new(IcmpPinger::new(config.ping_timeout()));
        let prober: Arc<dyn PortProber> = Arc::new(ConnectProber::new(&config));
        Self::with_components(config, snmp, http, pinger, prober)
    }

    /// Build over caller-supplied transports.
    pub fn with_components(
        config: ProbeConfig,
        snmp: Arc<dyn SnmpClient>,
        http: Arc<dyn HttpFetcher>,
        pinger: Arc<dyn Pinger>,
        prober: Arc<dyn PortProber>,
    ) -> Result<Self> {
        let tables = config.tables.clone();
        let scanner = Arc::new(NetworkScanner::new(prober, &config));
        let classifier = Arc::new(PrinterClassifier::new(Arc::clone(&snmp), tables.clone()));
        let resolver = StatusResolver::new(
            Arc::new(SnmpStatusProbe::new(snmp, tables.clone())),
            Arc::new(WebProbe::new(http, tables)?),
            pinger,
        );
        let discovery = PrinterDiscovery::new(
            Arc::clone(&scanner),
            Arc::clone(&classifier),
            config.scan_concurrency,
        );

        Ok(Self {
            config,
            scanner,
            classifier,
            resolver,
            discovery,
        })
    }

    /// Hosts in `cidr` with an open printer port.
    pub async fn scan_subnet(&self, cidr: &str) -> Result<Vec<Device>> {
        self.scanner.scan(cidr).await
    }

    /// Identity string when `address` looks like a printer.
    ///
    /// `community` falls back to the configured default.
    pub async fn classify_as_printer(
        &self,
        address: &str,
        community: Option<&str>,
    ) -> Result<Option<String>> {
        let target = parse_address(address)?;
        Ok(self
            .classifier
            .classify(target, self.community(community))
            .await)
    }

    /// Current status via the fallback chain for `mode`.
    pub async fn get_status(
        &self,
        address: &str,
        mode: &str,
        community: Option<&str>,
    ) -> Result<PrinterStatus> {
        let target = parse_address(address)?;
        self.resolver
            .resolve(target, mode, self.community(community))
            .await
    }

    /// New printers in `cidr`, skipping addresses in `known`.
    pub async fn discover_printers(
        &self,
        cidr: &str,
        known: &HashSet<IpAddr>,
        community: Option<&str>,
    ) -> Result<Vec<DiscoveredPrinter>> {
        self.discovery
            .discover(cidr, known, self.community(community))
            .await
    }

    fn community<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.config.default_community)
    }
}

fn parse_address(address: &str) -> Result<IpAddr> {
    let trimmed = address.trim();
    trimmed.parse().map_err(|_| {
        debug!(address, "rejecting unparsable address");
        TonerscopeError::InvalidTarget(format!("'{address}' is not an IP address"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use tonerscope_core::types::{ConnectionMode, ProbeMethod};

    use crate::snmp::{
        OID_PRINTER_STATUS, OID_SUPPLY_DESCRIPTION, OID_SUPPLY_LEVEL, OID_SUPPLY_MAX_CAPACITY,
        OID_SYS_DESCR, SNMP_PORT,
    };
    use crate::testing::{FakeHttp, FakePinger, FakePorts, FakeSnmp};

    fn monitor(snmp: FakeSnmp, pinger: FakePinger, ports: FakePorts) -> PrinterMonitor {
        PrinterMonitor::with_components(
            ProbeConfig::default(),
            Arc::new(snmp),
            Arc::new(FakeHttp::new()),
            Arc::new(pinger),
            Arc::new(ports),
        )
        .unwrap()
    }

    fn laser() -> FakeSnmp {
        FakeSnmp::new()
            .with_text(OID_SYS_DESCR, "Kyocera ECOSYS P2040dn")
            .with_text(&format!("{OID_SUPPLY_DESCRIPTION}.1.1"), "Black Toner Cartridge")
            .with_int(&format!("{OID_SUPPLY_LEVEL}.1.1"), 45)
            .with_int(&format!("{OID_SUPPLY_MAX_CAPACITY}.1.1"), 100)
            .with_int(OID_PRINTER_STATUS, 3)
    }

    #[tokio::test]
    async fn status_over_snmp() {
        let m = monitor(laser(), FakePinger::offline(), FakePorts::new());
        let status = m.get_status("10.9.8.7", "snmp", None).await.unwrap();

        assert_eq!(status.method, ProbeMethod::Snmp);
        assert!(status.online);
        assert_eq!(status.supplies.get("black"), Some(45));
        assert!(status.errors.is_empty());
        assert_eq!(status.headline_level(), Some(45));
    }

    #[tokio::test]
    async fn bad_address_is_invalid_target() {
        let m = monitor(laser(), FakePinger::online(), FakePorts::new());
        let err = m.get_status("printer.local", "snmp", None).await.unwrap_err();
        assert!(matches!(err, TonerscopeError::InvalidTarget(_)));

        let err = m.classify_as_printer("", Some("private")).await.unwrap_err();
        assert!(matches!(err, TonerscopeError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn bad_mode_is_invalid_mode() {
        let m = monitor(laser(), FakePinger::online(), FakePorts::new());
        let err = m.get_status("10.9.8.7", "SNMP", None).await.unwrap_err();
        assert!(matches!(err, TonerscopeError::InvalidMode(_)));
    }

    #[tokio::test]
    async fn classify_and_discover() {
        let printer = IpAddr::V4(Ipv4Addr::new(10, 9, 8, 7));
        let m = monitor(
            laser(),
            FakePinger::online(),
            FakePorts::new().with_open(printer, &[SNMP_PORT, 9100]),
        );

        assert_eq!(
            m.classify_as_printer("10.9.8.7", None).await.unwrap().as_deref(),
            Some("Kyocera ECOSYS P2040dn")
        );

        let devices = m.scan_subnet("10.9.8.7").await.unwrap();
        assert_eq!(devices.len(), 1);

        let found = m
            .discover_printers("10.9.8.0/29", &HashSet::new(), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].suggested_mode, ConnectionMode::Snmp);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = ProbeConfig {
            snmp_timeout_ms: 60_000,
            ..ProbeConfig::default()
        };
        assert!(matches!(
            PrinterMonitor::new(config),
            Err(TonerscopeError::Config(_))
        ));
    }
}
