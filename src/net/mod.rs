//! TCP networking primitives.
//!
//! Thin non-blocking wrappers over raw `libc` sockets:
//! - [`tcp_listener`]: [`TcpListener`] for the endpoint peers connect to
//! - [`tcp_stream`]: [`TcpStream`] for the control and peer connections
//! - [`utils`]: address conversion and descriptor flags
//!
//! Every call is non-blocking once the socket exists. Callers are expected to
//! consult the [`Poller`](crate::reactor::poller::Poller) before reading,
//! writing or accepting.
//!
//! [`TcpListener`]: tcp_listener::TcpListener
//! [`TcpStream`]: tcp_stream::TcpStream

pub mod tcp_listener;
pub mod tcp_stream;
pub(crate) mod utils;

use std::io;

/// Returns `true` for errors that only mean "try again on the next readiness event".
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
