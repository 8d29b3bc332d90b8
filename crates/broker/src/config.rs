//! Broker configuration. Constructed programmatically or from CLI flags;
//! the broker binds loopback only and exposes no authenticated surface.

use std::net::{IpAddr, Ipv4Addr};

use hb_protocol::{DEFAULT_PORT, KEEPALIVE_INTERVAL_MS, Tuning};

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Loopback bind address.
    pub bind: IpAddr,
    /// Listen port; 0 picks an ephemeral port (tests).
    pub port: u16,
    /// How long `wait_for_connection` waits for an extension handshake.
    pub connection_timeout_ms: u64,
    /// Extension keepalive ping interval.
    pub keepalive_interval_ms: u64,
    /// The runtime tuning record injected into commands.
    pub tuning: Tuning,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            connection_timeout_ms: 30_000,
            keepalive_interval_ms: KEEPALIVE_INTERVAL_MS,
            tuning: Tuning::default(),
        }
    }
}

impl BrokerConfig {
    /// Ephemeral-port configuration for tests.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            connection_timeout_ms: 2_000,
            ..Self::default()
        }
    }
}
