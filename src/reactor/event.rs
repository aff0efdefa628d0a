use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, c_short, pollfd};

/// Identifies a registered descriptor in readiness results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

/// Which readiness a registration asks for.
///
/// Error conditions are always reported by the kernel and need no opt-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
}

impl Interest {
    /// Read readiness only. Peers start out here.
    pub const READABLE: Self = Self {
        read: true,
        write: false,
    };

    /// Read and write readiness, for a connection with bytes to send.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    pub(crate) fn as_poll_events(self) -> c_short {
        let mut events = 0;
        if self.read {
            events |= POLLIN;
        }
        if self.write {
            events |= POLLOUT;
        }
        events
    }
}

/// Readiness reported for one descriptor in one poll round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    token: Token,
    readable: bool,
    writable: bool,
    error: bool,
}

impl Event {
    /// Classifies a `pollfd` after `poll` returned.
    ///
    /// A hang-up counts as readable so the following read observes the close.
    pub(crate) fn from_pollfd(token: Token, raw: &pollfd) -> Option<Self> {
        let revents = raw.revents;
        if revents == 0 {
            return None;
        }

        let wants_read = raw.events & POLLIN != 0;
        let wants_write = raw.events & POLLOUT != 0;

        Some(Self {
            token,
            readable: wants_read && revents & (POLLIN | POLLHUP) != 0,
            writable: wants_write && revents & POLLOUT != 0,
            error: revents & (POLLERR | POLLNVAL) != 0,
        })
    }

    /// The token the descriptor was registered under.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Data is available, or the remote end hung up.
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// `POLLERR` or `POLLNVAL` was set. Independent of the registered interest.
    pub fn is_error(&self) -> bool {
        self.error
    }
}
