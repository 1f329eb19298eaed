// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer identification from SNMP system objects.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use tonerscope_core::config::ProbeTables;

use crate::snmp::{OID_PRINTER_NAME, OID_SYS_DESCR, SnmpClient};

/// Decides whether a host is a printer and what model string to record.
pub struct PrinterClassifier {
    client: Arc<dyn SnmpClient>,
    tables: ProbeTables,
}

impl PrinterClassifier {
    pub fn new(client: Arc<dyn SnmpClient>, tables: ProbeTables) -> Self {
        Self { client, tables }
    }

    /// Identity string for `target`, or `None` when it does not look like a
    /// printer. SNMP failures are treated as "no data".
    pub async fn classify(&self, target: IpAddr, community: &str) -> Option<String> {
        let description = self.get_text(target, community, OID_SYS_DESCR).await?;

        if self
            .tables
            .is_printer_description(&description.to_lowercase())
        {
            debug!(addr = %target, model = %description, "sysDescr names a printer");
            return Some(description);
        }

        let name = self.get_text(target, community, OID_PRINTER_NAME).await?;
        debug!(addr = %target, name = %name, "Printer-MIB name present");
        Some(format!("{description} (Printer: {name})"))
    }

    async fn get_text(&self, target: IpAddr, community: &str, oid: &str) -> Option<String> {
        match self.client.get(target, community, oid).await {
            Ok(value) => value.and_then(|v| v.to_text()),
            Err(e) => {
                debug!(addr = %target, oid, error = %e, "SNMP get failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use crate::testing::FakeSnmp;

    const HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

    fn classifier(fake: FakeSnmp) -> PrinterClassifier {
        PrinterClassifier::new(Arc::new(fake), ProbeTables::default())
    }

    #[tokio::test]
    async fn vendor_keyword_returns_raw_description() {
        let c = classifier(FakeSnmp::new().with_text(OID_SYS_DESCR, "HP LaserJet Pro M404dn"));
        assert_eq!(
            c.classify(HOST, "public").await.as_deref(),
            Some("HP LaserJet Pro M404dn")
        );
    }

    #[tokio::test]
    async fn printer_mib_name_makes_a_composite() {
        let c = classifier(
            FakeSnmp::new()
                .with_text(OID_SYS_DESCR, "Embedded Linux 4.9")
                .with_text(OID_PRINTER_NAME, "Front Office"),
        );
        assert_eq!(
            c.classify(HOST, "public").await.as_deref(),
            Some("Embedded Linux 4.9 (Printer: Front Office)")
        );
    }

    #[tokio::test]
    async fn plain_host_is_not_a_printer() {
        let c = classifier(FakeSnmp::new().with_text(OID_SYS_DESCR, "Linux router 5.15"));
        assert_eq!(c.classify(HOST, "public").await, None);
    }

    #[tokio::test]
    async fn missing_sysdescr_is_not_an_error() {
        let c = classifier(FakeSnmp::new().with_text(OID_PRINTER_NAME, "Orphan"));
        assert_eq!(c.classify(HOST, "public").await, None);
    }

    #[tokio::test]
    async fn unreachable_host_classifies_the_same_twice() {
        let fake = Arc::new(FakeSnmp::silent());
        let c = PrinterClassifier::new(fake.clone(), ProbeTables::default());

        let first = c.classify(HOST, "public").await;
        let second = c.classify(HOST, "public").await;
        assert_eq!(first, None);
        assert_eq!(first, second);
        assert_eq!(fake.call_count(), 2);
    }
}
