//! Error types for the relay.
//!
//! Startup failures ([`RelayError::Bind`], [`RelayError::Connect`]) are fatal and
//! never retried. Faults on the control connection end the event loop. Faults on
//! a peer connection are handled inside the relay and never surface here.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while validating a [`RelayConfig`](crate::RelayConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reads need room for at least one byte.
    #[error("read block size must be at least 1")]
    ZeroBlockSize,

    /// The peer collection must hold at least one connection.
    #[error("max peers must be at least 1")]
    ZeroMaxPeers,

    /// The address could not be resolved to a socket address.
    #[error("invalid address '{0}' (expected 'host:port')")]
    InvalidAddress(String),
}

/// Errors that end the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The listening endpoint could not be bound.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The control connection could not be established.
    #[error("failed to connect to control at {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The readiness poll itself failed.
    #[error("readiness poll failed: {0}")]
    Poll(#[source] io::Error),

    /// Reading from the control connection failed.
    #[error("control read failed: {0}")]
    ControlRead(#[source] io::Error),

    /// Writing to the control connection failed.
    #[error("control write failed: {0}")]
    ControlWrite(#[source] io::Error),

    /// Accepting on the listening endpoint failed with a non-transient error.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The configuration was rejected before any socket was opened.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Any other I/O failure while setting up the relay.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
