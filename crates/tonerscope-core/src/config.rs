// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Probe configuration and the keyword/OID tables the probes consult.
//
// Everything here is read-only once a monitor is built: each probe receives
// its own clone at construction and never mutates it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TonerscopeError};

/// Upper bound for a single SNMP round trip.
pub const MAX_SNMP_TIMEOUT_MS: u64 = 3_000;

/// Upper bound for SNMP retries after the first attempt.
pub const MAX_SNMP_RETRIES: u32 = 1;

/// SNMP protocol version used for community-based requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    V2c,
}

/// Runtime settings for scanning and probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Community used when the caller does not supply one.
    pub default_community: String,
    pub snmp_version: SnmpVersion,
    /// Per-request SNMP timeout (at most 3000 ms).
    pub snmp_timeout_ms: u64,
    /// Retries after the first SNMP attempt (at most 1).
    pub snmp_retries: u32,
    /// Hard cap on rows collected by a single subtree walk.
    pub snmp_max_walk_rows: usize,
    pub http_timeout_ms: u64,
    pub http_max_redirects: usize,
    pub ping_timeout_ms: u64,
    /// TCP connect / UDP reply timeout per port during a scan.
    pub scan_connect_timeout_ms: u64,
    /// Hosts probed concurrently during a scan or discovery sweep.
    pub scan_concurrency: usize,
    /// Largest target (in addresses) a scan accepts.
    pub scan_max_hosts: u64,
    pub tables: ProbeTables,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            default_community: "public".into(),
            snmp_version: SnmpVersion::V1,
            snmp_timeout_ms: MAX_SNMP_TIMEOUT_MS,
            snmp_retries: MAX_SNMP_RETRIES,
            snmp_max_walk_rows: 256,
            http_timeout_ms: 10_000,
            http_max_redirects: 10,
            ping_timeout_ms: 2_000,
            scan_connect_timeout_ms: 1_000,
            scan_concurrency: 64,
            scan_max_hosts: 65_536,
            tables: ProbeTables::default(),
        }
    }
}

impl ProbeConfig {
    /// Load a configuration file (JSON). Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: ProbeConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the bounds the probes rely on.
    pub fn validate(&self) -> Result<()> {
        if self.snmp_timeout_ms == 0 || self.snmp_timeout_ms > MAX_SNMP_TIMEOUT_MS {
            return Err(TonerscopeError::Config(format!(
                "snmp_timeout_ms must be within 1..={MAX_SNMP_TIMEOUT_MS}, got {}",
                self.snmp_timeout_ms
            )));
        }
        if self.snmp_retries > MAX_SNMP_RETRIES {
            return Err(TonerscopeError::Config(format!(
                "snmp_retries must be at most {MAX_SNMP_RETRIES}, got {}",
                self.snmp_retries
            )));
        }
        if self.scan_concurrency == 0 {
            return Err(TonerscopeError::Config("scan_concurrency must be non-zero".into()));
        }
        if self.http_timeout_ms == 0 || self.ping_timeout_ms == 0 || self.scan_connect_timeout_ms == 0 {
            return Err(TonerscopeError::Config("timeouts must be non-zero".into()));
        }
        if self.default_community.is_empty() {
            return Err(TonerscopeError::Config("default_community must not be empty".into()));
        }
        Ok(())
    }

    pub fn snmp_timeout(&self) -> Duration {
        Duration::from_millis(self.snmp_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn scan_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_connect_timeout_ms)
    }
}

/// Keyword set naming one supply colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelKeywords {
    pub channel: String,
    /// Lower-case substrings that identify the channel.
    pub tokens: Vec<String>,
}

/// A single-OID supply lookup tried when the Printer-MIB walk is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackOid {
    pub channel: String,
    pub oid: String,
}

/// A CSS selector pair tried against a printer's status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorPattern {
    pub name: String,
    /// Elements whose text holds a supply percentage.
    pub supplies: String,
    /// Elements whose text is an alert/error message.
    pub alerts: String,
}

/// Immutable lookup tables shared by the classifier and the probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeTables {
    /// Lower-case tokens that mark a sysDescr as a printer.
    pub printer_keywords: Vec<String>,
    /// Colour channels, checked in order.
    pub channels: Vec<ChannelKeywords>,
    /// Tokens marking a description as a consumable even without a colour.
    pub supply_keywords: Vec<String>,
    pub fallback_oids: Vec<FallbackOid>,
    /// Web selector patterns, most specific first.
    pub web_patterns: Vec<SelectorPattern>,
    /// Channel names assigned by position to web gauge elements.
    pub web_channel_order: Vec<String>,
}

impl Default for ProbeTables {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let channel = |name: &str, tokens: &[&str]| ChannelKeywords {
            channel: name.into(),
            tokens: strings(tokens),
        };
        let fallback = |name: &str, oid: &str| FallbackOid {
            channel: name.into(),
            oid: oid.into(),
        };
        let pattern = |name: &str, supplies: &str, alerts: &str| SelectorPattern {
            name: name.into(),
            supplies: supplies.into(),
            alerts: alerts.into(),
        };

        Self {
            printer_keywords: strings(&[
                "printer", "laserjet", "officejet", "deskjet", "pagewide", "mfp", "canon",
                "epson", "brother", "xerox", "lexmark", "ricoh", "kyocera", "konica",
                "sharp", "oki", "samsung", "imagerunner", "workcentre", "bizhub",
            ]),
            channels: vec![
                channel("black", &["black", "bk"]),
                channel("cyan", &["cyan", "cy"]),
                channel("magenta", &["magenta", "mg"]),
                channel("yellow", &["yellow", "yl"]),
            ],
            supply_keywords: strings(&["toner", "cartridge", "ink"]),
            fallback_oids: vec![
                // Printer-MIB prtMarkerSuppliesLevel, first four rows.
                fallback("black", "1.3.6.1.2.1.43.11.1.1.9.1.1"),
                fallback("cyan", "1.3.6.1.2.1.43.11.1.1.9.1.2"),
                fallback("magenta", "1.3.6.1.2.1.43.11.1.1.9.1.3"),
                fallback("yellow", "1.3.6.1.2.1.43.11.1.1.9.1.4"),
                // HP private toner-remaining percentage.
                fallback("black", "1.3.6.1.4.1.11.2.3.9.4.2.1.4.1.10.1.1.18.0"),
                fallback("black", "1.3.6.1.4.1.11.2.3.9.4.2.1.4.1.2.5.0"),
            ],
            web_patterns: vec![
                pattern(
                    "vendor-gauge",
                    "td.SupplyGauge, div.gauge span.gauge-level, .consumable-block .data.percentage",
                    "td.StatusMessage, #StatusMessages li, .status-alert",
                ),
                pattern(
                    "supply-level",
                    ".supply-level, .supplies-level, .supply .level",
                    ".error-message, .status-error, .printer-alert",
                ),
                pattern(
                    "loose-class",
                    "[class*='toner'], [class*='level']",
                    "[class*='error'], [class*='alert']",
                ),
            ],
            web_channel_order: strings(&["black", "cyan", "magenta", "yellow"]),
        }
    }
}

impl ProbeTables {
    /// Whether a lower-cased description names a printer.
    pub fn is_printer_description(&self, lowered: &str) -> bool {
        self.printer_keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Colour channel for a lower-cased label, if any keyword matches.
    pub fn color_channel(&self, lowered: &str) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.tokens.iter().any(|t| lowered.contains(t.as_str())))
            .map(|c| c.channel.as_str())
    }

    /// Whether a lower-cased label mentions a consumable.
    pub fn mentions_supply(&self, lowered: &str) -> bool {
        self.supply_keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}
