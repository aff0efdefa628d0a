//! Relay configuration.

use crate::error::ConfigError;

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Bytes requested from a socket per read.
pub const DEFAULT_READ_BLOCK_SIZE: usize = 4096;

/// Peers held at once before new ones are turned away.
pub const DEFAULT_MAX_PEERS: usize = 16;

/// Settings for one [`Relay`](crate::Relay), checked by [`Self::validate`]
/// before any socket is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Where the harness is already listening for the control connection.
    pub control_addr: SocketAddr,
    /// Where the relay listens for peers. Port 0 picks a free port.
    pub listen_addr: SocketAddr,
    /// Upper bound on the bytes taken in by one read, and so on one payload.
    pub read_block_size: usize,
    /// Peers held at once. Connections beyond this are accepted and closed.
    pub max_peers: usize,
    /// Close peers left unserved this long. `None` keeps them indefinitely.
    pub peer_idle_timeout: Option<Duration>,
}

impl RelayConfig {
    /// Creates a configuration with the default block size and peer bound,
    /// and no idle timeout.
    pub fn new(control_addr: SocketAddr, listen_addr: SocketAddr) -> Self {
        Self {
            control_addr,
            listen_addr,
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
            max_peers: DEFAULT_MAX_PEERS,
            peer_idle_timeout: None,
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::ZeroBlockSize`] or [`ConfigError::ZeroMaxPeers`] when
    /// either bound is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }

        if self.max_peers == 0 {
            return Err(ConfigError::ZeroMaxPeers);
        }

        Ok(())
    }
}

/// Resolves `host:port`, preferring an IPv4 address when the name has both.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidAddress(format!("{host}:{port}"));
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| invalid())?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(invalid)
}
