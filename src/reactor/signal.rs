//! Interrupt handling.
//!
//! SIGINT and SIGTERM are turned into a wake of the relay's self-pipe, so an
//! interrupt ends the loop through the same orderly path as
//! [`ShutdownHandle::shutdown`].

use crate::reactor::waker::{ShutdownHandle, notify};

use libc::{SIGINT, SIGTERM, c_int, sighandler_t};
use std::io;
use std::mem;
use std::ptr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicI32, Ordering};

static SIGNAL_WAKE_FD: AtomicI32 = AtomicI32::new(-1);

// Keeps the pipe's write end open for as long as the handler may use it.
static INSTALLED: OnceLock<ShutdownHandle> = OnceLock::new();

extern "C" fn on_interrupt(_signal: c_int) {
    let fd = SIGNAL_WAKE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        notify(fd);
    }
}

/// Routes SIGINT and SIGTERM to `handle`.
///
/// Can be installed once per process; a second call fails with
/// [`io::ErrorKind::AlreadyExists`].
pub fn install_interrupt_handler(handle: ShutdownHandle) -> io::Result<()> {
    let fd = handle.raw_fd();
    if INSTALLED.set(handle).is_err() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "interrupt handler already installed",
        ));
    }

    SIGNAL_WAKE_FD.store(fd, Ordering::Relaxed);

    let handler = on_interrupt as extern "C" fn(c_int);
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = handler as sighandler_t;
    action.sa_flags = 0;

    unsafe { libc::sigemptyset(&mut action.sa_mask) };

    for signal in [SIGINT, SIGTERM] {
        if unsafe { libc::sigaction(signal, &action, ptr::null_mut()) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}
