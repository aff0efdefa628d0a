//! Fluent builder for [`Relay`] construction.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::relay::Relay;

use std::net::SocketAddr;
use std::time::Duration;

/// Builder for a [`Relay`].
///
/// [`build`](Self::build) validates the configuration, connects to the control
/// address and binds the listening endpoint. Both must succeed; there is no
/// retry.
///
/// # Example
/// ```no_run
/// use mock_peer::RelayBuilder;
///
/// let relay = RelayBuilder::new(
///     "127.0.0.1:60001".parse().unwrap(),
///     "127.0.0.1:60000".parse().unwrap(),
/// )
/// .read_block_size(4096)
/// .build()
/// .unwrap();
/// relay.run().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RelayBuilder {
    config: RelayConfig,
}

impl RelayBuilder {
    /// Starts from the defaults in [`RelayConfig::new`].
    pub fn new(control_addr: SocketAddr, listen_addr: SocketAddr) -> Self {
        Self {
            config: RelayConfig::new(control_addr, listen_addr),
        }
    }

    /// Starts from an existing configuration, e.g. one loaded by the caller.
    pub fn from_config(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Bytes requested per read on any connection.
    pub fn read_block_size(mut self, bytes: usize) -> Self {
        self.config.read_block_size = bytes;
        self
    }

    /// Upper bound on peers held at once; extra peers are closed on accept.
    pub fn max_peers(mut self, max: usize) -> Self {
        self.config.max_peers = max;
        self
    }

    /// Closes peers that sit unserved for longer than `timeout`.
    pub fn peer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.peer_idle_timeout = Some(timeout);
        self
    }

    /// Returns the configuration as built so far.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Validates, connects to control, then binds the listener.
    ///
    /// # Errors
    ///
    /// [`RelayError::Config`] for an invalid configuration,
    /// [`RelayError::Connect`] if control is unreachable, and
    /// [`RelayError::Bind`] if the listen address is taken.
    pub fn build(self) -> Result<Relay, RelayError> {
        Relay::start(self.config)
    }
}
