//! Host network link and clock
//!
//! On a host there is no radio to associate. The link counts as associated
//! once the broker endpoint resolves, which is the first thing an associated
//! radio is needed for.

use crate::config::{Endpoint, WifiCredentials};
use crate::transport::traits::{NetworkLink, TimeSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::timeout;
use tracing::{debug, info};
use zonelight_shared::now_secs;

/// Earliest wall-clock time accepted as valid (2020-01-01T00:00:00Z)
const MIN_VALID_UNIX_SECS: u64 = 1_577_836_800;

/// Network link backed by the host's network stack
pub struct HostNetworkLink {
    wifi: WifiCredentials,
    endpoint: Endpoint,
    resolve_timeout: Duration,
    connected: bool,
}

impl HostNetworkLink {
    pub fn new(wifi: WifiCredentials, endpoint: Endpoint) -> Self {
        Self {
            wifi,
            endpoint,
            resolve_timeout: Duration::from_secs(5),
            connected: false,
        }
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let target = self.endpoint.to_string();
        let addrs = timeout(self.resolve_timeout, lookup_host(target.as_str()))
            .await
            .map_err(|_| anyhow!("Timed out resolving {}", target))?
            .with_context(|| format!("Failed to resolve {}", target))?;

        let first = addrs
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No addresses for {}", target))?;
        debug!("Broker {} resolved to {}", target, first);
        Ok(first)
    }
}

#[async_trait]
impl NetworkLink for HostNetworkLink {
    async fn associate(&mut self) -> Result<()> {
        info!(
            "Attempting to connect to SSID: {} ({})",
            self.wifi.ssid,
            if self.wifi.passphrase.is_empty() {
                "open"
            } else {
                "secured"
            }
        );

        self.resolve().await?;
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn recheck(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        if let Err(e) = self.resolve().await {
            self.connected = false;
            return Err(e);
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

/// System clock; reports no time until the clock has been set
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_unix_secs(&self) -> Option<u64> {
        let now = now_secs();
        (now >= MIN_VALID_UNIX_SECS).then_some(now)
    }
}
