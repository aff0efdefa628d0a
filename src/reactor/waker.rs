//! Self-pipe used to interrupt a blocked [`Poller::wait`](crate::reactor::poller::Poller::wait).
//!
//! The relay registers the read end like any other descriptor. Writing one byte
//! to the write end, from any thread or from a signal handler, makes the next
//! poll return with the waker readable.

use crate::net::utils::set_nonblocking;

use libc::{c_int, c_void};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;

/// Owns one end of the pipe and closes it on drop.
#[derive(Debug)]
struct PipeEnd {
    fd: RawFd,
}

impl Drop for PipeEnd {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Read side, owned by the event loop.
#[derive(Debug)]
pub struct Waker {
    receiver: PipeEnd,
    sender: Arc<PipeEnd>,
}

impl Waker {
    /// Opens the pipe and puts both ends in non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the process is out of descriptors.
    pub fn new() -> io::Result<Self> {
        let mut fds = [0 as c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
            return Err(io::Error::last_os_error());
        }

        let receiver = PipeEnd { fd: fds[0] };
        let sender = PipeEnd { fd: fds[1] };

        set_nonblocking(receiver.fd)?;
        set_nonblocking(sender.fd)?;

        Ok(Self {
            receiver,
            sender: Arc::new(sender),
        })
    }

    /// Returns a handle that can wake this poller from another thread.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: self.sender.clone(),
        }
    }

    /// Empties the pipe so the waker stops reporting readable.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            let res = unsafe {
                libc::read(
                    self.receiver.fd,
                    buf.as_mut_ptr() as *mut c_void,
                    buf.len(),
                )
            };

            if res <= 0 {
                break;
            }
        }
    }
}

impl AsRawFd for Waker {
    fn as_raw_fd(&self) -> RawFd {
        self.receiver.fd
    }
}

/// Requests an orderly stop of a running [`Relay`](crate::Relay).
///
/// Cloneable and `Send`. The relay finishes its current dispatch batch, closes
/// every connection, and [`Relay::run`](crate::Relay::run) returns
/// [`Exit::Cancelled`](crate::Exit::Cancelled).
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    sender: Arc<PipeEnd>,
}

impl ShutdownHandle {
    /// Wakes the relay and asks it to stop.
    ///
    /// Never blocks. Calling it more than once, or after the relay has
    /// already returned, has no further effect.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mock_peer::RelayBuilder;
    /// use std::thread;
    ///
    /// let relay = RelayBuilder::new(
    ///     "127.0.0.1:7000".parse().unwrap(),
    ///     "127.0.0.1:7001".parse().unwrap(),
    /// )
    /// .build()
    /// .unwrap();
    ///
    /// let handle = relay.shutdown_handle();
    /// let worker = thread::spawn(move || relay.run());
    ///
    /// handle.shutdown();
    /// worker.join().unwrap().unwrap();
    /// ```
    pub fn shutdown(&self) {
        // A full pipe already holds a pending wake.
        let _ = notify(self.sender.fd);
    }

    pub(crate) fn raw_fd(&self) -> RawFd {
        self.sender.fd
    }
}

/// Writes the wake byte. Async-signal-safe.
pub(crate) fn notify(fd: RawFd) -> isize {
    let byte = 1u8;
    unsafe { libc::write(fd, &byte as *const u8 as *const c_void, 1) }
}
