// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fallback chain from a printer's configured connection mode to a status.
//
// Chain per mode:
//   snmp: SNMP → web → ICMP liveness
//   web:  web → SNMP → ICMP liveness
//   ping: ICMP liveness only
//
// Probes run strictly one after another; each later step runs only once the
// earlier one has definitely failed. A liveness reply on its own yields an
// online status with no supply data and the earlier failures attached as
// diagnostics.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use tonerscope_core::error::{ProbeError, Result, TonerscopeError};
use tonerscope_core::types::{
    ConnectionMode, ProbeMethod, ProbeOutcome, PrinterStatus, StatusReading,
};

use crate::reachability::Pinger;

/// One protocol able to read supplies and alerts from a printer.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Method recorded on a status this probe produced.
    fn method(&self) -> ProbeMethod;

    async fn read_status(
        &self,
        target: IpAddr,
        community: &str,
    ) -> std::result::Result<StatusReading, ProbeError>;
}

/// Runs the per-mode fallback chain.
pub struct StatusResolver {
    snmp: Arc<dyn StatusProbe>,
    web: Arc<dyn StatusProbe>,
    pinger: Arc<dyn Pinger>,
}

impl StatusResolver {
    pub fn new(
        snmp: Arc<dyn StatusProbe>,
        web: Arc<dyn StatusProbe>,
        pinger: Arc<dyn Pinger>,
    ) -> Self {
        Self { snmp, web, pinger }
    }

    /// Resolve with a mode given as text. Unknown modes fail before any
    /// probe runs.
    #[instrument(skip_all, fields(addr = %target, mode = %mode))]
    pub async fn resolve(&self, target: IpAddr, mode: &str, community: &str) -> Result<PrinterStatus> {
        let mode: ConnectionMode = mode.parse()?;
        self.resolve_mode(target, mode, community).await
    }

    pub async fn resolve_mode(
        &self,
        target: IpAddr,
        mode: ConnectionMode,
        community: &str,
    ) -> Result<PrinterStatus> {
        let chain = match mode {
            ConnectionMode::Ping => {
                let online = self.pinger.is_online(target).await;
                info!(addr = %target, online, "liveness checked");
                return Ok(PrinterStatus::liveness(online, ProbeMethod::Ping));
            }
            ConnectionMode::Snmp => [&self.snmp, &self.web],
            ConnectionMode::Web => [&self.web, &self.snmp],
        };

        let mut failures: Vec<(ProbeMethod, ProbeError)> = Vec::with_capacity(chain.len());
        for probe in chain {
            let method = probe.method();
            match ProbeOutcome::from(probe.read_status(target, community).await) {
                ProbeOutcome::Success(reading) => {
                    if !failures.is_empty() {
                        info!(addr = %target, mode = %mode, method = %method, "status read by fallback method");
                    }
                    return Ok(PrinterStatus::from_reading(reading, method));
                }
                ProbeOutcome::Failure(error) => {
                    warn!(addr = %target, method = %method, error = %error, "status probe failed");
                    failures.push((method, error));
                }
            }
        }

        let diagnostics: Vec<String> = failures
            .iter()
            .map(|(method, error)| format!("{method}: {error}"))
            .collect();

        if self.pinger.is_online(target).await {
            warn!(addr = %target, "no status data; host answers ping");
            return Ok(PrinterStatus::liveness(true, ProbeMethod::PingFallback)
                .with_diagnostics(diagnostics));
        }

        let mut rest = diagnostics.into_iter();
        let primary = rest.next().unwrap_or_default();
        let fallback = rest
            .chain(std::iter::once("ping: no reply".to_string()))
            .collect::<Vec<_>>()
            .join("; ");
        Err(TonerscopeError::AllMethodsFailed { primary, fallback })
    }
}
