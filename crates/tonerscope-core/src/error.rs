// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tonerscope.
//
// `TonerscopeError` is what crosses the crate boundary. `ProbeError` stays
// inside the probing layer: the resolver turns it into "try the next method"
// and only surfaces it once the whole fallback chain is exhausted.

use thiserror::Error;

/// Top-level error type for all Tonerscope operations.
#[derive(Debug, Error)]
pub enum TonerscopeError {
    // -- Caller input --
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid connection mode '{0}' (expected snmp, web or ping)")]
    InvalidMode(String),

    // -- Probing --
    #[error("network scan failed: {cause}")]
    ScanFailed { cause: String },

    #[error("all probing methods failed (primary: {primary}; fallback: {fallback})")]
    AllMethodsFailed { primary: String, fallback: String },

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single probe attempt.
///
/// Never returned from the public status API directly; the resolver folds
/// these into [`TonerscopeError::AllMethodsFailed`] when nothing answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("unparsable response: {0}")]
    ParseMiss(String),

    #[error("no supply or status data retrievable over SNMP")]
    SnmpUnavailable,

    #[error("no usable web status page: {0}")]
    WebUnavailable(String),
}

impl ProbeError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProbeError::Timeout | ProbeError::Transport(_) => true,
            ProbeError::Http { status } => *status >= 500,
            ProbeError::ParseMiss(_)
            | ProbeError::SnmpUnavailable
            | ProbeError::WebUnavailable(_) => false,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TonerscopeError>;
