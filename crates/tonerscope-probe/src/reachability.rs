// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ICMP liveness check. Carries no supply or alert information.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::debug;

/// Answers "does this host reply at all?".
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn is_online(&self, target: IpAddr) -> bool;
}

/// Single ICMP echo via `surge-ping`.
///
/// Raw ICMP sockets need elevated privileges on most systems; a socket
/// error is reported as offline, the same as a lost reply.
pub struct IcmpPinger {
    timeout: Duration,
}

impl IcmpPinger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Pinger for IcmpPinger {
    async fn is_online(&self, target: IpAddr) -> bool {
        let payload = [0u8; 8];
        match timeout(self.timeout, surge_ping::ping(target, &payload)).await {
            Ok(Ok((_packet, rtt))) => {
                debug!(addr = %target, rtt_ms = rtt.as_millis() as u64, "echo reply");
                true
            }
            Ok(Err(e)) => {
                debug!(addr = %target, error = %e, "ping failed");
                false
            }
            Err(_) => {
                debug!(addr = %target, timeout_ms = self.timeout.as_millis() as u64, "ping timed out");
                false
            }
        }
    }
}
