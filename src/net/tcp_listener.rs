//! TCP listener for the endpoint peers connect to.
//!
//! # Usage
//!
//! ```no_run
//! use mock_peer::net::tcp_listener::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
//! println!("Listening on {}", listener.local_addr().unwrap());
//!
//! // Only call accept once the poller reports the listener readable.
//! if let Some((stream, peer_addr)) = listener.accept().unwrap() {
//!     println!("New connection from {}", peer_addr);
//!     drop(stream);
//! }
//! ```
use crate::net::tcp_stream::{TcpStream, disable_sigpipe};
use crate::net::utils::{new_socket, raw_to_socketaddr, set_nonblocking, socketaddr_to_raw};

use libc::{SO_REUSEADDR, SOL_SOCKET, c_int, c_void, sockaddr, sockaddr_storage, socklen_t};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

const BACKLOG: c_int = 128;

/// A non-blocking listening socket.
///
/// Every stream returned by [`Self::accept`] is already in non-blocking mode.
#[derive(Debug)]
pub struct TcpListener {
    file_descriptor: RawFd,
}

impl TcpListener {
    /// Binds a listener to `address`.
    ///
    /// This method performs the following:
    /// 1. Creates a new socket
    /// 2. Enables `SO_REUSEADDR` so a restarted relay can rebind at once
    /// 3. Sets it to non-blocking mode
    /// 4. Binds to the specified address
    /// 5. Starts listening with a backlog of 128
    pub fn bind(address: SocketAddr) -> io::Result<Self> {
        let (raw, length) = socketaddr_to_raw(&address);
        let listener = Self {
            file_descriptor: new_socket(&address)?,
        };

        let enable: c_int = 1;
        let ret = unsafe {
            libc::setsockopt(
                listener.file_descriptor,
                SOL_SOCKET,
                SO_REUSEADDR,
                &enable as *const c_int as *const c_void,
                mem::size_of::<c_int>() as socklen_t,
            )
        };

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        set_nonblocking(listener.file_descriptor)?;

        let ret = unsafe {
            libc::bind(
                listener.file_descriptor,
                &raw as *const sockaddr_storage as *const sockaddr,
                length,
            )
        };

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        let ret = unsafe { libc::listen(listener.file_descriptor, BACKLOG) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(listener)
    }

    /// Accepts one pending connection.
    ///
    /// Returns `Ok(None)` when nothing is pending, or when the connection was
    /// aborted by the remote before it could be accepted.
    pub fn accept(&self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

        let client_file_descriptor = unsafe {
            libc::accept(
                self.file_descriptor,
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        };

        if client_file_descriptor < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock
                | io::ErrorKind::Interrupted
                | io::ErrorKind::ConnectionAborted => Ok(None),
                _ => Err(err),
            };
        }

        let stream = TcpStream::from_raw(client_file_descriptor);
        set_nonblocking(client_file_descriptor)?;
        disable_sigpipe(client_file_descriptor)?;

        Ok(Some((stream, raw_to_socketaddr(&storage)?)))
    }

    /// Returns the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

        let result = unsafe {
            libc::getsockname(
                self.file_descriptor,
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        raw_to_socketaddr(&storage)
    }

    /// Stops listening. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.file_descriptor >= 0 {
            unsafe { libc::close(self.file_descriptor) };
            self.file_descriptor = -1;
        }
    }
}

impl AsRawFd for TcpListener {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        self.close();
    }
}
