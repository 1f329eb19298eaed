// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Supply levels and device alerts over SNMP (RFC 3805 Printer-MIB).
//
// The marker-supplies table is read column by column: descriptions, levels
// and maximum capacities are walked separately and joined on their row
// index. When the table is empty a short list of single-OID lookups
// (generic rows, then vendor-private objects) is tried instead.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use tonerscope_core::config::ProbeTables;
use tonerscope_core::error::ProbeError;
use tonerscope_core::types::{ProbeMethod, StatusReading, SupplyReading};

use crate::resolver::StatusProbe;
use crate::snmp::{
    OID_PRINTER_STATUS, OID_SUPPLY_DESCRIPTION, OID_SUPPLY_LEVEL, OID_SUPPLY_MAX_CAPACITY,
    SnmpClient, WalkRow, index_suffix,
};

/// Status probe reading the Printer-MIB supplies table.
pub struct SnmpStatusProbe {
    client: Arc<dyn SnmpClient>,
    tables: ProbeTables,
}

impl SnmpStatusProbe {
    pub fn new(client: Arc<dyn SnmpClient>, tables: ProbeTables) -> Self {
        Self { client, tables }
    }

    /// Read supplies and alerts.
    ///
    /// Fails with `SnmpUnavailable` when the agent answered but offered
    /// neither supplies nor alerts, and with the transport error when the
    /// first walk could not reach the agent at all.
    pub async fn snmp_status(
        &self,
        target: IpAddr,
        community: &str,
    ) -> Result<StatusReading, ProbeError> {
        // An agent that does not answer the first walk will not answer the
        // rest either; give up before spending the remaining budget.
        let descriptions = self
            .client
            .walk(target, community, OID_SUPPLY_DESCRIPTION)
            .await?;
        let levels = self.walk_or_empty(target, community, OID_SUPPLY_LEVEL).await;
        let maxima = self
            .walk_or_empty(target, community, OID_SUPPLY_MAX_CAPACITY)
            .await;

        let mut reading = StatusReading {
            supplies: collect_supplies(&descriptions, &levels, &maxima, &self.tables),
            ..StatusReading::default()
        };

        match self.client.get(target, community, OID_PRINTER_STATUS).await {
            Ok(Some(value)) => {
                if let Some(code) = value.as_i64() {
                    apply_device_status(code, &mut reading);
                }
            }
            Ok(None) => debug!(addr = %target, "no printer status object"),
            Err(e) => debug!(addr = %target, error = %e, "printer status lookup failed"),
        }

        if reading.supplies.is_empty() {
            self.fallback_lookups(target, community, &mut reading.supplies)
                .await;
        }

        if !reading.has_data() {
            debug!(addr = %target, "SNMP agent offered no supply or alert data");
            return Err(ProbeError::SnmpUnavailable);
        }

        info!(
            addr = %target,
            supplies = reading.supplies.len(),
            errors = reading.errors.len(),
            "SNMP status read"
        );
        Ok(reading)
    }

    async fn walk_or_empty(&self, target: IpAddr, community: &str, root: &str) -> Vec<WalkRow> {
        match self.client.walk(target, community, root).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(addr = %target, root, error = %e, "SNMP walk failed");
                Vec::new()
            }
        }
    }

    async fn fallback_lookups(&self, target: IpAddr, community: &str, supplies: &mut SupplyReading) {
        for entry in &self.tables.fallback_oids {
            if supplies.contains(&entry.channel) {
                continue;
            }
            match self.client.get(target, community, &entry.oid).await {
                Ok(Some(value)) => match value.as_i64() {
                    Some(level @ 0..=100) => {
                        debug!(addr = %target, oid = %entry.oid, level, "fallback supply OID answered");
                        supplies.insert(entry.channel.clone(), level);
                    }
                    other => debug!(addr = %target, oid = %entry.oid, value = ?other, "fallback value out of range"),
                },
                Ok(None) => {}
                Err(ProbeError::Timeout) => {
                    debug!(addr = %target, "agent stopped answering during fallback lookups");
                    return;
                }
                Err(e) => debug!(addr = %target, oid = %entry.oid, error = %e, "fallback lookup failed"),
            }
        }
    }
}

#[async_trait]
impl StatusProbe for SnmpStatusProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Snmp
    }

    async fn read_status(&self, target: IpAddr, community: &str) -> Result<StatusReading, ProbeError> {
        self.snmp_status(target, community).await
    }
}

/// Join the three supply columns on their row index.
pub fn collect_supplies(
    descriptions: &[WalkRow],
    levels: &[WalkRow],
    maxima: &[WalkRow],
    tables: &ProbeTables,
) -> SupplyReading {
    let by_index = |rows: &[WalkRow], root: &str| -> HashMap<String, i64> {
        rows.iter()
            .filter_map(|(oid, value)| Some((index_suffix(oid, root)?.to_string(), value.as_i64()?)))
            .collect()
    };
    let levels = by_index(levels, OID_SUPPLY_LEVEL);
    let maxima = by_index(maxima, OID_SUPPLY_MAX_CAPACITY);

    let mut supplies = SupplyReading::new();
    for (oid, value) in descriptions {
        let Some(index) = index_suffix(oid, OID_SUPPLY_DESCRIPTION) else {
            continue;
        };
        let Some(description) = value.to_text() else {
            continue;
        };
        let (Some(&level), Some(&max)) = (levels.get(index), maxima.get(index)) else {
            debug!(index, description = %description, "supply row missing level or capacity");
            continue;
        };
        let Some(percent) = supply_percentage(level, max) else {
            continue;
        };
        let Some(mut channel) = supply_channel(&description, tables) else {
            debug!(index, description = %description, "unrecognised supply skipped");
            continue;
        };
        if supplies.contains(&channel) {
            // Two rows for one colour (toner + drum, say): keep both.
            channel = sanitize_label(&description);
            if supplies.contains(&channel) {
                continue;
            }
        }
        supplies.insert(channel, percent);
    }
    supplies
}

/// Percentage remaining, `None` when the capacity is unknown or zero.
pub fn supply_percentage(level: i64, max_capacity: i64) -> Option<i64> {
    if max_capacity <= 0 {
        return None;
    }
    let percent = (level as f64 / max_capacity as f64 * 100.0).round() as i64;
    Some(percent.clamp(0, 100))
}

/// Channel key for a supply description.
///
/// Colour keywords win; otherwise any consumable falls back to its own
/// sanitized description so it is still reported.
pub fn supply_channel(description: &str, tables: &ProbeTables) -> Option<String> {
    let lowered = description.to_lowercase();
    if let Some(channel) = tables.color_channel(&lowered) {
        return Some(channel.to_string());
    }
    tables
        .mentions_supply(&lowered)
        .then(|| sanitize_label(description))
}

fn sanitize_label(description: &str) -> String {
    description.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Label for an hrPrinterStatus code.
pub fn device_status_label(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("Other"),
        2 => Some("Unknown"),
        3 => Some("Idle"),
        5 => Some("Printing"),
        6 => Some("Warmup"),
        7 => Some("Stopped Printing"),
        8 => Some("Offline"),
        _ => None,
    }
}

fn apply_device_status(code: i64, reading: &mut StatusReading) {
    let Some(label) = device_status_label(code) else {
        debug!(code, "unmapped printer status code");
        return;
    };
    reading.state = Some(label.to_string());
    if matches!(code, 7 | 8) {
        reading.push_error(format!("Printer Status: {label}"));
    }
}
