//! Non-blocking TCP stream used for the control connection and every peer.

use crate::net::utils::{new_socket, raw_to_socketaddr, set_nonblocking, socketaddr_to_raw};

use libc::{c_int, c_void, sockaddr, sockaddr_storage, socklen_t};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = 0;

/// A connected, non-blocking byte stream.
///
/// Reads and writes never block: when the kernel has nothing to give or no room
/// to take, they fail with [`io::ErrorKind::WouldBlock`]. A read of zero bytes
/// means the remote side closed the connection in an orderly way.
///
/// The descriptor is closed by [`Self::close`] or on drop, whichever comes first.
#[derive(Debug)]
pub struct TcpStream {
    file_descriptor: RawFd,
}

impl TcpStream {
    /// Opens an outbound connection to `address`.
    ///
    /// The connect itself is blocking; the stream is switched to non-blocking
    /// mode once established.
    pub fn connect(address: SocketAddr) -> io::Result<Self> {
        let (raw, length) = socketaddr_to_raw(&address);
        let stream = Self::from_raw(new_socket(&address)?);

        let ret = unsafe {
            libc::connect(
                stream.file_descriptor,
                &raw as *const sockaddr_storage as *const sockaddr,
                length,
            )
        };

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        set_nonblocking(stream.file_descriptor)?;
        disable_sigpipe(stream.file_descriptor)?;

        Ok(stream)
    }

    /// Takes ownership of an already connected, non-blocking descriptor.
    pub(crate) fn from_raw(file_descriptor: RawFd) -> Self {
        Self { file_descriptor }
    }

    /// Reads up to `buf.len()` bytes. `Ok(0)` signals an orderly remote close.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let res = unsafe {
            libc::read(
                self.file_descriptor,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    /// Writes as much of `buf` as the kernel accepts right now.
    ///
    /// Short writes are normal; the caller keeps the remainder.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let res = unsafe {
            libc::send(
                self.file_descriptor,
                buf.as_ptr() as *const c_void,
                buf.len(),
                SEND_FLAGS,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    /// Returns the address of the remote end.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

        let ret = unsafe {
            libc::getpeername(
                self.file_descriptor,
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        };

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        raw_to_socketaddr(&storage)
    }

    /// Closes the descriptor. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.file_descriptor >= 0 {
            unsafe { libc::close(self.file_descriptor) };
            self.file_descriptor = -1;
        }
    }

    /// Returns `true` once [`Self::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.file_descriptor < 0
    }
}

impl AsRawFd for TcpStream {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub(crate) fn disable_sigpipe(file_descriptor: RawFd) -> io::Result<()> {
    let enable: c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            file_descriptor,
            libc::SOL_SOCKET,
            libc::SO_NOSIGPIPE,
            &enable as *const c_int as *const c_void,
            mem::size_of::<c_int>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

// MSG_NOSIGNAL on every send covers the remaining platforms.
#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd")))]
pub(crate) fn disable_sigpipe(_file_descriptor: RawFd) -> io::Result<()> {
    Ok(())
}
