//! Connection registry: the control connection, the listening endpoint, and
//! the ordered collection of accepted peers, each with its readiness interest.

use crate::net::tcp_listener::TcpListener;
use crate::net::tcp_stream::TcpStream;
use crate::reactor::event::{Interest, Token};
use crate::reactor::poller::Poller;

use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

pub(crate) const CONTROL: Token = Token(0);
pub(crate) const LISTENER: Token = Token(1);
pub(crate) const WAKER: Token = Token(2);

const FIRST_PEER: usize = 3;

#[derive(Debug)]
pub(crate) struct Peer {
    pub(crate) token: Token,
    pub(crate) stream: TcpStream,
    pub(crate) addr: SocketAddr,
    pub(crate) write_interest: bool,
    pub(crate) accepted_at: Instant,
}

#[derive(Debug)]
pub(crate) struct Registry {
    control: TcpStream,
    control_write_interest: bool,
    listener: TcpListener,
    peers: Vec<Peer>,
    next_token: usize,
}

impl Registry {
    pub(crate) fn new(control: TcpStream, listener: TcpListener) -> Self {
        Self {
            control,
            control_write_interest: false,
            listener,
            peers: Vec::new(),
            next_token: FIRST_PEER,
        }
    }

    pub(crate) fn control(&self) -> &TcpStream {
        &self.control
    }

    pub(crate) fn listener(&self) -> &TcpListener {
        &self.listener
    }

    /// Appends a freshly accepted peer, read-interested only.
    ///
    /// Write interest is asserted separately, once there is something to send.
    pub(crate) fn add_peer(&mut self, stream: TcpStream, addr: SocketAddr) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;

        self.peers.push(Peer {
            token,
            stream,
            addr,
            write_interest: false,
            accepted_at: Instant::now(),
        });

        token
    }

    /// Removes a peer from every interest set. The caller closes the stream.
    pub(crate) fn remove_peer(&mut self, token: Token) -> Option<Peer> {
        let index = self.peers.iter().position(|peer| peer.token == token)?;
        Some(self.peers.remove(index))
    }

    pub(crate) fn peer(&self, token: Token) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.token == token)
    }

    #[cfg(test)]
    pub(crate) fn peer_tokens(&self) -> Vec<Token> {
        self.peers.iter().map(|peer| peer.token).collect()
    }

    #[cfg(test)]
    pub(crate) fn is_peer(&self, token: Token) -> bool {
        self.peer(token).is_some()
    }

    pub(crate) fn peer_count(&self) -> usize {
        self.peers.len()
    }

    #[cfg(test)]
    pub(crate) fn has_write_interest(&self, token: Token) -> bool {
        if token == CONTROL {
            return self.control_write_interest;
        }

        self.peer(token).is_some_and(|peer| peer.write_interest)
    }

    pub(crate) fn enable_write(&mut self, token: Token) {
        self.set_write_interest(token, true);
    }

    pub(crate) fn disable_write(&mut self, token: Token) {
        self.set_write_interest(token, false);
    }

    pub(crate) fn enable_write_all_peers(&mut self) {
        for peer in &mut self.peers {
            peer.write_interest = true;
        }
    }

    /// Drops write interest on every peer other than `keep`.
    pub(crate) fn disable_write_except(&mut self, keep: Token) {
        for peer in self.peers.iter_mut().filter(|peer| peer.token != keep) {
            peer.write_interest = false;
        }
    }

    fn set_write_interest(&mut self, token: Token, enabled: bool) {
        if token == CONTROL {
            self.control_write_interest = enabled;
            return;
        }

        if let Some(peer) = self.peers.iter_mut().find(|peer| peer.token == token) {
            peer.write_interest = enabled;
        }
    }

    /// Registers every connection with the poller for the coming round.
    pub(crate) fn register_interests(&self, poller: &mut Poller) {
        poller.register(
            self.control.as_raw_fd(),
            CONTROL,
            interest(self.control_write_interest),
        );
        poller.register(self.listener.as_raw_fd(), LISTENER, Interest::READABLE);

        for peer in &self.peers {
            poller.register(
                peer.stream.as_raw_fd(),
                peer.token,
                interest(peer.write_interest),
            );
        }
    }

    /// Peers connected for at least `timeout`, oldest first, excluding `exempt`.
    pub(crate) fn idle_peers(
        &self,
        now: Instant,
        timeout: Duration,
        exempt: Option<Token>,
    ) -> Vec<Token> {
        self.peers
            .iter()
            .filter(|peer| Some(peer.token) != exempt)
            .filter(|peer| now.saturating_duration_since(peer.accepted_at) >= timeout)
            .map(|peer| peer.token)
            .collect()
    }

    /// The earliest instant at which a non-exempt peer becomes idle.
    pub(crate) fn next_idle_deadline(
        &self,
        timeout: Duration,
        exempt: Option<Token>,
    ) -> Option<Instant> {
        self.peers
            .iter()
            .filter(|peer| Some(peer.token) != exempt)
            .map(|peer| peer.accepted_at + timeout)
            .min()
    }

    /// Closes every peer without flushing, then the listener and control.
    ///
    /// Returns the number of peers that were still open.
    pub(crate) fn close_all(&mut self) -> usize {
        let open_peers = self.peers.len();
        for mut peer in self.peers.drain(..) {
            peer.stream.close();
        }

        self.listener.close();
        self.control.close();

        open_peers
    }
}

fn interest(write: bool) -> Interest {
    if write {
        Interest::READ_WRITE
    } else {
        Interest::READABLE
    }
}
