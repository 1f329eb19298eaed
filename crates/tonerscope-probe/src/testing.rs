// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted fakes shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tonerscope_core::error::ProbeError;
use tonerscope_core::types::{ProbeMethod, StatusReading};

use crate::reachability::Pinger;
use crate::resolver::StatusProbe;
use crate::scanner::PortProber;
use crate::snmp::{SnmpClient, SnmpValue, WalkRow};
use crate::web::HttpFetcher;

/// In-memory SNMP agent. An agent with `silent` set times out on every call.
#[derive(Default)]
pub struct FakeSnmp {
    objects: BTreeMap<String, SnmpValue>,
    silent: bool,
    pub calls: AtomicUsize,
}

impl FakeSnmp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, oid: &str, text: &str) -> Self {
        self.objects.insert(oid.into(), SnmpValue::Text(text.into()));
        self
    }

    pub fn with_int(mut self, oid: &str, value: i64) -> Self {
        self.objects.insert(oid.into(), SnmpValue::Integer(value));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnmpClient for FakeSnmp {
    async fn get(
        &self,
        _target: IpAddr,
        _community: &str,
        oid: &str,
    ) -> Result<Option<SnmpValue>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.silent {
            return Err(ProbeError::Timeout);
        }
        Ok(self.objects.get(oid).cloned())
    }

    async fn walk(
        &self,
        _target: IpAddr,
        _community: &str,
        root: &str,
    ) -> Result<Vec<WalkRow>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.silent {
            return Err(ProbeError::Timeout);
        }
        let prefix = format!("{root}.");
        Ok(self
            .objects
            .iter()
            .filter(|(oid, _)| oid.starts_with(&prefix))
            .map(|(oid, value)| (oid.clone(), value.clone()))
            .collect())
    }
}

/// Canned HTTP responses keyed by URL; unknown URLs are unreachable.
#[derive(Default)]
pub struct FakeHttp {
    pages: HashMap<String, Result<String, ProbeError>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.into(), Ok(body.into()));
        self
    }

    pub fn with_failure(mut self, url: &str, error: ProbeError) -> Self {
        self.pages.insert(url.into(), Err(error));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpFetcher for FakeHttp {
    async fn fetch(&self, url: &str) -> Result<String, ProbeError> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::Transport(format!("connection refused: {url}"))))
    }
}

/// Port table per host. Probing `fatal_host` fails the whole scan.
#[derive(Default)]
pub struct FakePorts {
    open: HashMap<IpAddr, Vec<u16>>,
    fatal_host: Option<IpAddr>,
    pub calls: AtomicUsize,
}

impl FakePorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(mut self, host: IpAddr, ports: &[u16]) -> Self {
        self.open.insert(host, ports.to_vec());
        self
    }

    pub fn failing_at(mut self, host: IpAddr) -> Self {
        self.fatal_host = Some(host);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProber for FakePorts {
    async fn is_open(&self, target: IpAddr, port: u16) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fatal_host == Some(target) {
            return Err(ProbeError::Transport("operation not permitted".into()));
        }
        Ok(self.open.get(&target).is_some_and(|ports| ports.contains(&port)))
    }
}

/// Fixed liveness answer.
#[derive(Default)]
pub struct FakePinger {
    online: bool,
    pub calls: AtomicUsize,
}

impl FakePinger {
    pub fn online() -> Self {
        Self {
            online: true,
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for FakePinger {
    async fn is_online(&self, _target: IpAddr) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.online
    }
}

/// Status probe returning a canned outcome.
pub struct FakeProbe {
    method: ProbeMethod,
    outcome: Result<StatusReading, ProbeError>,
    pub calls: AtomicUsize,
}

impl FakeProbe {
    pub fn succeeding(method: ProbeMethod, reading: StatusReading) -> Self {
        Self {
            method,
            outcome: Ok(reading),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(method: ProbeMethod, error: ProbeError) -> Self {
        Self {
            method,
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for FakeProbe {
    fn method(&self) -> ProbeMethod {
        self.method
    }

    async fn read_status(
        &self,
        _target: IpAddr,
        _community: &str,
    ) -> Result<StatusReading, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
