// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subnet sweep for printer-relevant ports.
//
// Every address in the target range is checked on HTTP (80), SNMP (161/udp),
// HTTPS (443) and raw JetDirect (9100). Hosts are probed concurrently up to
// a configured limit; the four ports of one host are probed together. The
// sweep runs on its own task so status queries keep flowing while it works.
//
// The result is all-or-nothing: if the probing mechanism itself fails
// (socket creation refused, no permission) no partial list is returned.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use ipnet::{IpAddrRange, IpNet, Ipv4AddrRange, Ipv6AddrRange};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use tonerscope_core::config::ProbeConfig;
use tonerscope_core::error::{ProbeError, Result, TonerscopeError};
use tonerscope_core::types::Device;

use crate::snmp::SNMP_PORT;

/// Ports checked on every host, ascending.
pub const SCAN_PORTS: [u16; 4] = [80, SNMP_PORT, 443, 9100];

/// Checks a single port.
///
/// `Ok(false)` covers closed, filtered and silent ports. `Err` means the
/// probe could not be carried out at all and aborts the scan.
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn is_open(&self, target: IpAddr, port: u16) -> std::result::Result<bool, ProbeError>;
}

/// TCP connect checks, plus an SNMP GetRequest for UDP/161.
pub struct ConnectProber {
    connect_timeout: Duration,
    community: String,
}

impl ConnectProber {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            connect_timeout: config.scan_connect_timeout(),
            community: config.default_community.clone(),
        }
    }

    async fn tcp_open(&self, target: IpAddr, port: u16) -> std::result::Result<bool, ProbeError> {
        let addr = SocketAddr::new(target, port);
        match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) => local_failure(&e).map(|()| false),
            Err(_) => Ok(false),
        }
    }

    /// Any datagram back from the agent counts as open, including an
    /// error response for a wrong community.
    async fn snmp_open(&self, target: IpAddr) -> std::result::Result<bool, ProbeError> {
        let bind_addr: SocketAddr = match target {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ProbeError::Transport(format!("UDP bind: {e}")))?;
        if let Err(e) = socket.connect(SocketAddr::new(target, SNMP_PORT)).await {
            return local_failure(&e).map(|()| false);
        }

        let request = snmp_get_sysdescr(&self.community);
        if let Err(e) = socket.send(&request).await {
            return local_failure(&e).map(|()| false);
        }

        let mut buf = [0u8; 1500];
        match timeout(self.connect_timeout, socket.recv(&mut buf)).await {
            Ok(Ok(len)) => Ok(len > 0),
            // ICMP port unreachable surfaces here as ConnectionRefused.
            Ok(Err(_)) | Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl PortProber for ConnectProber {
    async fn is_open(&self, target: IpAddr, port: u16) -> std::result::Result<bool, ProbeError> {
        if port == SNMP_PORT {
            self.snmp_open(target).await
        } else {
            self.tcp_open(target, port).await
        }
    }
}

/// Errors that say nothing about the remote port.
fn local_failure(e: &std::io::Error) -> std::result::Result<(), ProbeError> {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::PermissionDenied | ErrorKind::OutOfMemory | ErrorKind::Unsupported => {
            Err(ProbeError::Transport(e.to_string()))
        }
        _ => Ok(()),
    }
}

/// SNMPv1 GetRequest for sysDescr.0, BER encoded.
fn snmp_get_sysdescr(community: &str) -> Vec<u8> {
    const SYS_DESCR: [u8; 8] = [0x2B, 6, 1, 2, 1, 1, 1, 0];
    const REQUEST_ID: [u8; 4] = [0x54, 0x53, 0x00, 0x01];

    let varbind = tlv(0x30, &[tlv(0x06, &SYS_DESCR), vec![0x05, 0x00]].concat());
    let varbind_list = tlv(0x30, &varbind);
    let pdu = tlv(
        0xA0,
        &[
            tlv(0x02, &REQUEST_ID),
            vec![0x02, 0x01, 0x00],
            vec![0x02, 0x01, 0x00],
            varbind_list,
        ]
        .concat(),
    );
    tlv(
        0x30,
        &[vec![0x02, 0x01, 0x00], tlv(0x04, community.as_bytes()), pdu].concat(),
    )
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = content.len();
    let mut out = vec![tag];
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(&significant);
    }
    out.extend_from_slice(content);
    out
}

/// Parse a CIDR range or a bare address, refusing ranges over `max_hosts`.
pub fn parse_target(subnet: &str, max_hosts: u64) -> Result<IpNet> {
    let trimmed = subnet.trim();
    let net = trimmed
        .parse::<IpNet>()
        .or_else(|_| trimmed.parse::<IpAddr>().map(IpNet::from))
        .map_err(|_| TonerscopeError::InvalidTarget(format!("'{subnet}' is not a CIDR range or IP address")))?;

    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    let too_large = 1u64
        .checked_shl(host_bits)
        .is_none_or(|size| size > max_hosts);
    if too_large {
        return Err(TonerscopeError::InvalidTarget(format!(
            "'{net}' spans more than {max_hosts} addresses"
        )));
    }
    Ok(net)
}

/// Sweeps a range with a [`PortProber`].
pub struct NetworkScanner {
    prober: Arc<dyn PortProber>,
    concurrency: usize,
    max_hosts: u64,
}

impl NetworkScanner {
    pub fn new(prober: Arc<dyn PortProber>, config: &ProbeConfig) -> Self {
        Self {
            prober,
            concurrency: config.scan_concurrency.max(1),
            max_hosts: config.scan_max_hosts,
        }
    }

    /// Hosts in `subnet` with at least one open port, sorted by address.
    pub async fn scan(&self, subnet: &str) -> Result<Vec<Device>> {
        let net = parse_target(subnet, self.max_hosts)?;
        info!(subnet = %net, concurrency = self.concurrency, "starting subnet scan");

        let prober = Arc::clone(&self.prober);
        let concurrency = self.concurrency;
        let devices = tokio::spawn(sweep(prober, net, concurrency))
            .await
            .map_err(|e| TonerscopeError::ScanFailed {
                cause: format!("scan task aborted: {e}"),
            })??;

        info!(subnet = %net, found = devices.len(), "subnet scan complete");
        Ok(devices)
    }
}

/// Every address in `net`, network and broadcast addresses included.
pub fn range_addresses(net: IpNet) -> IpAddrRange {
    match net {
        IpNet::V4(n) => IpAddrRange::V4(Ipv4AddrRange::new(n.network(), n.broadcast())),
        IpNet::V6(n) => IpAddrRange::V6(Ipv6AddrRange::new(n.network(), n.broadcast())),
    }
}

async fn sweep(prober: Arc<dyn PortProber>, net: IpNet, concurrency: usize) -> Result<Vec<Device>> {
    let found: Vec<Option<Device>> = stream::iter(range_addresses(net))
        .map(|address| {
            let prober = Arc::clone(&prober);
            async move { probe_host(prober.as_ref(), address).await }
        })
        .buffer_unordered(concurrency)
        .try_collect()
        .await
        .map_err(|e| {
            warn!(subnet = %net, error = %e, "scan aborted");
            TonerscopeError::ScanFailed { cause: e.to_string() }
        })?;

    let mut devices: Vec<Device> = found.into_iter().flatten().collect();
    devices.sort_by_key(|d| d.address);
    Ok(devices)
}

async fn probe_host(
    prober: &dyn PortProber,
    address: IpAddr,
) -> std::result::Result<Option<Device>, ProbeError> {
    let checks = SCAN_PORTS.iter().map(|&port| async move {
        prober.is_open(address, port).await.map(|open| open.then_some(port))
    });
    let ports: Vec<u16> = try_join_all(checks).await?.into_iter().flatten().collect();

    if ports.is_empty() {
        return Ok(None);
    }
    debug!(addr = %address, ports = ?ports, "host answered");
    Ok(Some(Device { address, ports }))
}
