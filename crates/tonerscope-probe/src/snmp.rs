// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SNMP transport used by the classifier and the SNMP status probe.
//
// `snmp2` only offers a blocking session, so every exchange runs on the
// Tokio blocking pool. A session is opened per call and dropped before the
// call returns; nothing is cached between requests.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use snmp2::{Oid, SyncSession, Value};
use tracing::{debug, warn};

use tonerscope_core::config::{ProbeConfig, SnmpVersion};
use tonerscope_core::error::ProbeError;

/// Standard SNMP agent port.
pub const SNMP_PORT: u16 = 161;

/// SNMPv2-MIB sysDescr.0
pub const OID_SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";

/// Printer-MIB prtGeneralPrinterName.1
pub const OID_PRINTER_NAME: &str = "1.3.6.1.2.1.43.5.1.1.16.1";

/// Printer-MIB prtMarkerSuppliesDescription column.
pub const OID_SUPPLY_DESCRIPTION: &str = "1.3.6.1.2.1.43.11.1.1.6";

/// Printer-MIB prtMarkerSuppliesMaxCapacity column.
pub const OID_SUPPLY_MAX_CAPACITY: &str = "1.3.6.1.2.1.43.11.1.1.8";

/// Printer-MIB prtMarkerSuppliesLevel column.
pub const OID_SUPPLY_LEVEL: &str = "1.3.6.1.2.1.43.11.1.1.9";

/// HOST-RESOURCES-MIB hrPrinterStatus.1
pub const OID_PRINTER_STATUS: &str = "1.3.6.1.2.1.25.3.5.1.1.1";

/// An SNMP value copied out of the response buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    Text(String),
    Other,
}

impl SnmpValue {
    /// Numeric view; textual values are parsed when they hold a number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(n) => Some(*n),
            SnmpValue::Text(s) => s.trim().parse().ok(),
            SnmpValue::Other => None,
        }
    }

    /// Printable form, `None` for empty strings and opaque values.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SnmpValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            SnmpValue::Integer(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One row of a subtree walk: full dotted OID and its value.
pub type WalkRow = (String, SnmpValue);

/// Minimal SNMP operations the probes need.
#[async_trait]
pub trait SnmpClient: Send + Sync {
    /// GET a single OID. `Ok(None)` when the agent has no such object.
    async fn get(
        &self,
        target: IpAddr,
        community: &str,
        oid: &str,
    ) -> Result<Option<SnmpValue>, ProbeError>;

    /// Walk every object below `root` in lexicographic order.
    async fn walk(
        &self,
        target: IpAddr,
        community: &str,
        root: &str,
    ) -> Result<Vec<WalkRow>, ProbeError>;
}

/// `SnmpClient` backed by `snmp2` blocking sessions.
#[derive(Debug, Clone)]
pub struct Snmp2Client {
    version: SnmpVersion,
    timeout: Duration,
    retries: u32,
    max_rows: usize,
}

impl Snmp2Client {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            version: config.snmp_version,
            timeout: config.snmp_timeout(),
            retries: config.snmp_retries,
            max_rows: config.snmp_max_walk_rows,
        }
    }
}

#[async_trait]
impl SnmpClient for Snmp2Client {
    async fn get(
        &self,
        target: IpAddr,
        community: &str,
        oid: &str,
    ) -> Result<Option<SnmpValue>, ProbeError> {
        let client = self.clone();
        let community = community.to_owned();
        let oid = oid.to_owned();

        run_blocking(move || {
            let requested = parse_oid(&oid)?;
            let mut session = client.open_session(target, &community)?;
            let row = client.exchange(&mut session, &requested, false)?;
            debug!(addr = %target, oid = %oid, found = row.as_ref().is_some_and(|(_, v)| v.is_some()), "SNMP get");
            Ok(row.and_then(|(_, value)| value))
        })
        .await
    }

    async fn walk(
        &self,
        target: IpAddr,
        community: &str,
        root: &str,
    ) -> Result<Vec<WalkRow>, ProbeError> {
        let client = self.clone();
        let community = community.to_owned();
        let root = root.trim_start_matches('.').to_owned();

        run_blocking(move || {
            let prefix = format!("{root}.");
            let mut cursor = parse_oid(&root)?;
            let mut session = client.open_session(target, &community)?;
            let mut rows: Vec<WalkRow> = Vec::new();

            loop {
                if rows.len() >= client.max_rows {
                    warn!(addr = %target, root = %root, rows = rows.len(), "SNMP walk truncated");
                    break;
                }
                let Some((oid, value)) = client.exchange(&mut session, &cursor, true)? else {
                    break;
                };
                // Left the subtree, reached the end of the MIB, or the agent
                // stopped advancing.
                if !oid.starts_with(&prefix) {
                    break;
                }
                let Some(value) = value else { break };
                if rows.last().is_some_and(|(prev, _)| *prev == oid) {
                    break;
                }
                cursor = parse_oid(&oid)?;
                rows.push((oid, value));
            }

            debug!(addr = %target, root = %root, rows = rows.len(), "SNMP walk finished");
            Ok(rows)
        })
        .await
    }
}

impl Snmp2Client {
    fn open_session(&self, target: IpAddr, community: &str) -> Result<SyncSession, ProbeError> {
        let destination = SocketAddr::new(target, SNMP_PORT);
        let session = match self.version {
            SnmpVersion::V1 => {
                SyncSession::new_v1(destination, community.as_bytes(), Some(self.timeout), 0)
            }
            SnmpVersion::V2c => {
                SyncSession::new_v2c(destination, community.as_bytes(), Some(self.timeout), 0)
            }
        };
        session.map_err(|e| ProbeError::Transport(format!("SNMP session to {destination}: {e}")))
    }

    /// One GET or GETNEXT with the configured retry budget.
    ///
    /// Returns the response OID with its value (`None` for the SNMP
    /// exception values), or `None` when the agent answered with an error
    /// status.
    fn exchange(
        &self,
        session: &mut SyncSession,
        oid: &Oid<'_>,
        next: bool,
    ) -> Result<Option<(String, Option<SnmpValue>)>, ProbeError> {
        let mut last_error = ProbeError::Timeout;

        for attempt in 0..=self.retries {
            let response = if next {
                session.getnext(oid)
            } else {
                session.get(oid)
            };
            match response {
                Ok(pdu) => {
                    if pdu.error_status != 0 {
                        return Ok(None);
                    }
                    return Ok(pdu
                        .varbinds
                        .into_iter()
                        .next()
                        .map(|(name, value)| (normalize_oid(&name.to_string()), owned_value(&value))));
                }
                Err(e) => {
                    debug!(attempt, error = ?e, "SNMP exchange failed");
                    last_error = classify_failure(&format!("{e:?}"));
                }
            }
        }

        Err(last_error)
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, ProbeError>
where
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ProbeError::Transport(format!("SNMP worker: {e}")))?
}

/// Parse a dotted OID (leading dot allowed).
pub fn parse_oid(dotted: &str) -> Result<Oid<'static>, ProbeError> {
    let arcs = oid_arcs(dotted).ok_or_else(|| ProbeError::ParseMiss(format!("invalid OID '{dotted}'")))?;
    Oid::from(arcs.as_slice()).map_err(|e| ProbeError::ParseMiss(format!("invalid OID '{dotted}': {e:?}")))
}

fn oid_arcs(dotted: &str) -> Option<Vec<u64>> {
    let trimmed = dotted.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split('.').map(|arc| arc.parse().ok()).collect()
}

fn normalize_oid(oid: &str) -> String {
    oid.trim().trim_start_matches('.').to_string()
}

/// Trailing index of `oid` below the column `root` (e.g. "1.1").
pub fn index_suffix<'a>(oid: &'a str, root: &str) -> Option<&'a str> {
    oid.strip_prefix(root.trim_start_matches('.'))?
        .strip_prefix('.')
        .filter(|rest| !rest.is_empty())
}

fn owned_value(value: &Value<'_>) -> Option<SnmpValue> {
    match value {
        Value::Integer(n) => Some(SnmpValue::Integer(*n)),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => {
            Some(SnmpValue::Integer(i64::from(*n)))
        }
        Value::Counter64(n) => Some(SnmpValue::Integer(i64::try_from(*n).unwrap_or(i64::MAX))),
        Value::OctetString(bytes) => Some(SnmpValue::Text(
            String::from_utf8_lossy(bytes).trim_end_matches('\0').trim().to_string(),
        )),
        Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => None,
        _ => Some(SnmpValue::Other),
    }
}

fn classify_failure(detail: &str) -> ProbeError {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("receive") || lower.contains("timed out") || lower.contains("wouldblock") {
        ProbeError::Timeout
    } else {
        ProbeError::Transport(detail.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_arcs_accept_leading_dot() {
        assert_eq!(oid_arcs(".1.3.6.1"), Some(vec![1, 3, 6, 1]));
        assert_eq!(oid_arcs("1.3.6.1.2.1.1.1.0").map(|a| a.len()), Some(9));
        assert_eq!(oid_arcs("1.3.x"), None);
        assert_eq!(oid_arcs(""), None);
    }

    #[test]
    fn parse_oid_rejects_garbage() {
        assert!(parse_oid(OID_SYS_DESCR).is_ok());
        assert!(matches!(parse_oid("sysDescr"), Err(ProbeError::ParseMiss(_))));
    }

    #[test]
    fn index_suffix_strips_column_root() {
        let oid = "1.3.6.1.2.1.43.11.1.1.6.1.3";
        assert_eq!(index_suffix(oid, OID_SUPPLY_DESCRIPTION), Some("1.3"));
        assert_eq!(index_suffix(oid, OID_SUPPLY_LEVEL), None);
        assert_eq!(index_suffix(OID_SUPPLY_DESCRIPTION, OID_SUPPLY_DESCRIPTION), None);
        // A sibling column sharing a textual prefix is not a child.
        assert_eq!(index_suffix("1.3.6.1.2.1.43.11.1.1.60.1", OID_SUPPLY_DESCRIPTION), None);
    }

    #[test]
    fn value_views() {
        assert_eq!(SnmpValue::Integer(45).as_i64(), Some(45));
        assert_eq!(SnmpValue::Text(" 80 ".into()).as_i64(), Some(80));
        assert_eq!(SnmpValue::Text("Black Toner".into()).as_i64(), None);
        assert_eq!(SnmpValue::Text(" Black Toner ".into()).to_text().as_deref(), Some("Black Toner"));
        assert_eq!(SnmpValue::Text("  ".into()).to_text(), None);
        assert_eq!(SnmpValue::Other.as_i64(), None);
    }

    #[test]
    fn receive_failures_count_as_timeouts() {
        assert_eq!(classify_failure("Receive"), ProbeError::Timeout);
        assert!(matches!(classify_failure("Send"), ProbeError::Transport(_)));
    }
}
