//! `poll(2)` based readiness poller.
//!
//! The interest list is rebuilt every round: callers [`clear`](Poller::clear)
//! it, [`register`](Poller::register) each descriptor with its current
//! interest, then [`wait`](Poller::wait). Level-triggered, so anything left
//! unread is reported again on the next round.

use crate::reactor::event::{Event, Interest, Token};

use libc::{c_int, nfds_t, pollfd};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Per-round `poll(2)` interest list.
///
/// Each registration pairs a descriptor with the [`Token`] its events are
/// reported under.
pub struct Poller {
    fds: Vec<pollfd>,
    tokens: Vec<Token>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller {
    /// Creates a poller with no registrations.
    pub fn new() -> Self {
        Self {
            fds: Vec::with_capacity(64),
            tokens: Vec::with_capacity(64),
        }
    }

    /// Drops every registration from the previous round.
    pub fn clear(&mut self) {
        self.fds.clear();
        self.tokens.clear();
    }

    /// Adds `fd` to this round's interest list.
    ///
    /// Events for `fd` come back from [`Self::wait`] tagged with `token`.
    /// Registering the same descriptor twice reports it twice.
    pub fn register(&mut self, fd: RawFd, token: Token, interest: Interest) {
        self.fds.push(pollfd {
            fd,
            events: interest.as_poll_events(),
            revents: 0,
        });
        self.tokens.push(token);
    }

    /// Number of registrations in the current round.
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Returns `true` if nothing is registered for this round.
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Blocks until at least one registration is ready or `timeout` elapses.
    ///
    /// `None` waits indefinitely. A signal arriving during the wait returns an
    /// empty batch instead of an error.
    pub fn wait(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();

        let res = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as nfds_t,
                timeout_ms(timeout),
            )
        };

        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }

            return Err(err);
        }

        if res == 0 {
            return Ok(());
        }

        events.extend(
            self.fds
                .iter()
                .zip(self.tokens.iter())
                .filter_map(|(raw, token)| Event::from_pollfd(*token, raw)),
        );

        Ok(())
    }
}

fn timeout_ms(timeout: Option<Duration>) -> c_int {
    match timeout {
        None => -1,
        Some(duration) => {
            // Round up so a sub-millisecond deadline does not spin at zero.
            let ms = duration.as_nanos().div_ceil(1_000_000);
            ms.min(c_int::MAX as u128) as c_int
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_rounds_up_to_whole_milliseconds() {
        assert_eq!(timeout_ms(None), -1);
        assert_eq!(timeout_ms(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_ms(Some(Duration::from_micros(10))), 1);
        assert_eq!(timeout_ms(Some(Duration::from_millis(250))), 250);
        assert_eq!(timeout_ms(Some(Duration::from_secs(u64::MAX))), c_int::MAX);
    }
}
