// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Tonerscope.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, TonerscopeError};

/// A live host found by a subnet scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub address: IpAddr,
    /// Open printer-relevant ports, ascending.
    pub ports: Vec<u16>,
}

impl Device {
    pub fn has_port(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }
}

/// Supply channel name to percentage remaining.
///
/// Values are clamped to `0..=100` on insertion, so a reading can never hold
/// an out-of-range level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplyReading(BTreeMap<String, u8>);

impl SupplyReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a level, clamping it into `0..=100`. Returns the stored value.
    pub fn insert(&mut self, channel: impl Into<String>, percent: i64) -> u8 {
        let level = percent.clamp(0, 100) as u8;
        self.0.insert(channel.into(), level);
        level
    }

    pub fn get(&self, channel: &str) -> Option<u8> {
        self.0.get(channel).copied()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.0.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for SupplyReading {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        let mut reading = SupplyReading::new();
        for (channel, percent) in iter {
            reading.insert(channel, percent);
        }
        reading
    }
}

/// How the status of a printer should primarily be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Snmp,
    Web,
    Ping,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snmp => "snmp",
            Self::Web => "web",
            Self::Ping => "ping",
        }
    }
}

impl FromStr for ConnectionMode {
    type Err = TonerscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snmp" => Ok(Self::Snmp),
            "web" => Ok(Self::Web),
            "ping" => Ok(Self::Ping),
            other => Err(TonerscopeError::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The probing method that produced a [`PrinterStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeMethod {
    Snmp,
    Web,
    Ping,
    /// Liveness only, after every data-bearing probe failed.
    PingFallback,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snmp => "snmp",
            Self::Web => "web",
            Self::Ping => "ping",
            Self::PingFallback => "ping-fallback",
        }
    }
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplies and alerts read from a printer by one probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReading {
    pub supplies: SupplyReading,
    /// Distinct alert messages in the order they were found.
    pub errors: Vec<String>,
    /// Device state label, when the protocol reports one.
    pub state: Option<String>,
}

impl StatusReading {
    /// Whether the reading carries anything worth reporting.
    pub fn has_data(&self) -> bool {
        !self.supplies.is_empty() || !self.errors.is_empty()
    }

    /// Append an alert unless an identical one is already present.
    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
    }
}

/// Result of a single probe attempt, as consumed by the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success(StatusReading),
    Failure(ProbeError),
}

impl From<std::result::Result<StatusReading, ProbeError>> for ProbeOutcome {
    fn from(result: std::result::Result<StatusReading, ProbeError>) -> Self {
        match result {
            Ok(reading) => Self::Success(reading),
            Err(reason) => Self::Failure(reason),
        }
    }
}

/// Normalised printer status returned to the caller.
///
/// Built fresh for every query; the caller persists whatever it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterStatus {
    pub supplies: SupplyReading,
    pub errors: Vec<String>,
    pub method: ProbeMethod,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Failures of the probes tried before `method` answered.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl PrinterStatus {
    /// Status built from a data-bearing probe reading.
    pub fn from_reading(reading: StatusReading, method: ProbeMethod) -> Self {
        Self {
            supplies: reading.supplies,
            errors: reading.errors,
            method,
            online: true,
            state: reading.state,
            diagnostics: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    /// Liveness-only status.
    pub fn liveness(online: bool, method: ProbeMethod) -> Self {
        Self {
            supplies: SupplyReading::new(),
            errors: Vec::new(),
            method,
            online,
            state: None,
            diagnostics: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The single level a printer record shows: black if present, otherwise
    /// the first channel by name.
    pub fn headline_level(&self) -> Option<u8> {
        self.supplies
            .get("black")
            .or_else(|| self.supplies.iter().next().map(|(_, v)| v))
    }
}

/// A scanned host that classified as a printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredPrinter {
    pub address: IpAddr,
    pub ports: Vec<u16>,
    /// Identity string from the classifier (usually sysDescr).
    pub model: String,
    /// `Snmp` when UDP 161 answered during the scan, otherwise `Web`.
    pub suggested_mode: ConnectionMode,
}
