use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::net::is_transient;
use crate::net::tcp_listener::TcpListener;
use crate::net::tcp_stream::TcpStream;
use crate::reactor::event::{Event, Interest, Token};
use crate::reactor::poller::Poller;
use crate::reactor::waker::{ShutdownHandle, Waker};
use crate::relay::registry::{CONTROL, LISTENER, Registry, WAKER};
use crate::relay::state::{Phase, RelayState};

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

/// Why [`Relay::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// The harness closed the control connection.
    ControlClosed,
    /// A [`ShutdownHandle`] or an interrupt asked the relay to stop.
    Cancelled,
}

/// Emulates a single remote peer.
///
/// Relays one opaque payload at a time between the control connection and
/// whichever peer connection currently exists. A payload from control is
/// written to the next writable peer, which is then closed. A payload from a
/// peer is written to control, and the peer is then closed.
pub struct Relay {
    config: RelayConfig,
    registry: Registry,
    state: RelayState,
    poller: Poller,
    waker: Waker,
    events: Vec<Event>,
    buffer: Vec<u8>,
    cancelled: bool,
}

impl Relay {
    pub(crate) fn start(config: RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;

        info!(control = %config.control_addr, "connecting to control");
        let control =
            TcpStream::connect(config.control_addr).map_err(|source| RelayError::Connect {
                addr: config.control_addr,
                source,
            })?;

        let listener =
            TcpListener::bind(config.listen_addr).map_err(|source| RelayError::Bind {
                addr: config.listen_addr,
                source,
            })?;
        info!(listen = %listener.local_addr()?, "listening for peers");

        let waker = Waker::new()?;
        let buffer = vec![0u8; config.read_block_size];

        Ok(Self {
            config,
            registry: Registry::new(control, listener),
            state: RelayState::Idle,
            poller: Poller::new(),
            waker,
            events: Vec::with_capacity(64),
            buffer,
            cancelled: false,
        })
    }

    /// The address peers should connect to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.registry.listener().local_addr()
    }

    /// Returns a handle that stops [`run`](Self::run) from another thread.
    ///
    /// # Example
    /// ```no_run
    /// # use mock_peer::RelayBuilder;
    /// # let relay = RelayBuilder::new("127.0.0.1:60001".parse().unwrap(), "127.0.0.1:0".parse().unwrap()).build().unwrap();
    /// let handle = relay.shutdown_handle();
    /// let worker = std::thread::spawn(move || relay.run());
    ///
    /// handle.shutdown();
    /// worker.join().unwrap().unwrap();
    /// ```
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.waker.handle()
    }

    /// Returns where the pending payload stands, without its bytes.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Returns the number of peer connections currently held.
    pub fn peer_count(&self) -> usize {
        self.registry.peer_count()
    }

    /// Runs the event loop until control closes, the relay is cancelled, or
    /// a fault ends it.
    ///
    /// Every connection is closed before this returns, whatever the outcome.
    /// Peers still open are closed without flushing.
    pub fn run(mut self) -> Result<Exit, RelayError> {
        let result = self.event_loop();

        match &result {
            Ok(exit) => info!(?exit, "relay stopped"),
            Err(err) => error!(%err, "relay failed"),
        }

        let open_peers = self.registry.close_all();
        info!(open_peers, "closed control, listener and peers");

        result
    }

    fn event_loop(&mut self) -> Result<Exit, RelayError> {
        loop {
            self.poller.clear();
            self.poller
                .register(self.waker.as_raw_fd(), WAKER, Interest::READABLE);
            self.registry.register_interests(&mut self.poller);

            let timeout = self.next_timeout();
            self.poller
                .wait(&mut self.events, timeout)
                .map_err(RelayError::Poll)?;

            let events = mem::take(&mut self.events);
            let outcome = self.dispatch(&events);
            self.events = events;

            if let Some(exit) = outcome? {
                return Ok(exit);
            }

            self.close_idle_peers();

            if self.cancelled {
                return Ok(Exit::Cancelled);
            }
        }
    }

    /// Readable first, then writable, then error conditions.
    fn dispatch(&mut self, events: &[Event]) -> Result<Option<Exit>, RelayError> {
        for event in events.iter().filter(|event| event.is_readable()) {
            if let Some(exit) = self.on_readable(event.token())? {
                return Ok(Some(exit));
            }
        }

        for event in events.iter().filter(|event| event.is_writable()) {
            self.on_writable(event.token())?;
        }

        for event in events.iter().filter(|event| event.is_error()) {
            self.on_error(event.token());
        }

        Ok(None)
    }

    fn on_readable(&mut self, token: Token) -> Result<Option<Exit>, RelayError> {
        match token {
            WAKER => {
                self.waker.drain();
                info!("shutdown requested");
                self.cancelled = true;
                Ok(None)
            }
            CONTROL => self.read_control(),
            LISTENER => {
                self.accept_peer()?;
                Ok(None)
            }
            peer => {
                self.read_peer(peer);
                Ok(None)
            }
        }
    }

    fn on_writable(&mut self, token: Token) -> Result<(), RelayError> {
        match token {
            CONTROL => self.write_control(),
            WAKER | LISTENER => Ok(()),
            peer => {
                self.write_peer(peer);
                Ok(())
            }
        }
    }

    fn on_error(&self, token: Token) {
        match token {
            CONTROL => warn!("error condition on control connection"),
            LISTENER => warn!("error condition on listener"),
            WAKER => warn!("error condition on shutdown pipe"),
            peer => match self.registry.peer(peer) {
                Some(entry) => warn!(peer = %entry.addr, "error condition on peer connection"),
                None => debug!(?peer, "error condition on a peer already closed"),
            },
        }
    }

    fn read_control(&mut self) -> Result<Option<Exit>, RelayError> {
        let n = match self.registry.control().read(&mut self.buffer) {
            Ok(n) => n,
            Err(err) if is_transient(&err) => return Ok(None),
            Err(err) => return Err(RelayError::ControlRead(err)),
        };

        if n == 0 {
            info!("control closed the connection");
            return Ok(Some(Exit::ControlClosed));
        }

        info!(bytes = n, "received from control");

        let payload = self.buffer[..n].to_vec();
        let peers_connected = self.registry.peer_count() > 0;
        if !self.state.capture_from_control(payload, peers_connected) {
            warn!(
                bytes = n,
                phase = ?self.state.phase(),
                pending = ?self.state.pending_len(),
                "payload from control while another is in flight, discarding"
            );
            return Ok(None);
        }

        if peers_connected {
            self.registry.enable_write_all_peers();
        }
        debug!(phase = ?self.state.phase(), "relay state changed");

        Ok(None)
    }

    fn accept_peer(&mut self) -> Result<(), RelayError> {
        let (stream, addr) = match self.registry.listener().accept() {
            Ok(Some(accepted)) => accepted,
            Ok(None) => return Ok(()),
            Err(err) if is_descriptor_exhaustion(&err) => {
                warn!(%err, "out of descriptors, leaving the peer in the backlog");
                return Ok(());
            }
            Err(err) => return Err(RelayError::Accept(err)),
        };

        if self.registry.peer_count() >= self.config.max_peers {
            warn!(
                peer = %addr,
                max_peers = self.config.max_peers,
                "peer backlog full, closing new peer"
            );
            drop(stream);
            return Ok(());
        }

        let token = self.registry.add_peer(stream, addr);
        info!(peer = %addr, peers = self.registry.peer_count(), "accepted peer");

        if self.state.peer_accepted() {
            self.registry.enable_write(token);
            debug!(phase = ?self.state.phase(), "relay state changed");
        }

        Ok(())
    }

    fn read_peer(&mut self, token: Token) {
        let Some(peer) = self.registry.peer(token) else {
            return;
        };
        let addr = peer.addr;

        let n = match peer.stream.read(&mut self.buffer) {
            Ok(0) => {
                info!(peer = %addr, "peer closed the connection");
                self.close_peer(token);
                return;
            }
            Ok(n) => n,
            Err(err) if is_transient(&err) => return,
            Err(err) => {
                warn!(peer = %addr, %err, "peer read failed, closing peer");
                self.close_peer(token);
                return;
            }
        };

        info!(peer = %addr, bytes = n, "received from peer");

        let payload = self.buffer[..n].to_vec();
        if !self.state.capture_from_peer(payload, token) {
            warn!(
                peer = %addr,
                bytes = n,
                phase = ?self.state.phase(),
                pending = ?self.state.pending_len(),
                "payload from peer while another is in flight, discarding"
            );
            return;
        }

        self.registry.enable_write(CONTROL);
        debug!(phase = ?self.state.phase(), "relay state changed");
    }

    fn write_control(&mut self) -> Result<(), RelayError> {
        let RelayState::AwaitingControlSend {
            payload,
            written,
            source,
        } = &mut self.state
        else {
            self.registry.disable_write(CONTROL);
            return Ok(());
        };

        match self.registry.control().write(&payload[*written..]) {
            Ok(n) => *written += n,
            Err(err) if is_transient(&err) => return Ok(()),
            Err(err) => return Err(RelayError::ControlWrite(err)),
        }

        if *written < payload.len() {
            debug!(written = *written, total = payload.len(), "partial write to control");
            return Ok(());
        }

        info!(bytes = payload.len(), "sent to control");
        let source = *source;

        self.state = RelayState::Idle;
        self.registry.disable_write(CONTROL);
        self.close_peer(source);
        debug!(phase = ?self.state.phase(), "relay state changed");

        Ok(())
    }

    fn write_peer(&mut self, token: Token) {
        let Some(peer) = self.registry.peer(token) else {
            return;
        };
        let addr = peer.addr;

        let RelayState::AwaitingPeerSend {
            payload,
            written,
            target,
        } = &mut self.state
        else {
            self.registry.disable_write(token);
            return;
        };

        if target.is_some_and(|target| target != token) {
            self.registry.disable_write(token);
            return;
        }

        match peer.stream.write(&payload[*written..]) {
            Ok(n) => *written += n,
            Err(err) if is_transient(&err) => return,
            Err(err) => {
                warn!(peer = %addr, %err, "peer write failed, closing peer");
                self.close_peer(token);
                return;
            }
        }

        if target.is_none() {
            *target = Some(token);
            self.registry.disable_write_except(token);
        }

        if *written < payload.len() {
            debug!(peer = %addr, written = *written, total = payload.len(), "partial write to peer");
            return;
        }

        info!(peer = %addr, bytes = payload.len(), "sent to peer, closing it");

        self.state = RelayState::AwaitingPeerRecv;
        self.close_peer(token);
        debug!(phase = ?self.state.phase(), "relay state changed");
    }

    /// Deregisters and closes a peer, then repairs the state if it was mid-cycle.
    fn close_peer(&mut self, token: Token) {
        let Some(mut peer) = self.registry.remove_peer(token) else {
            return;
        };
        peer.stream.close();
        debug!(peer = %peer.addr, peers = self.registry.peer_count(), "peer closed");

        let peers_remaining = self.registry.peer_count() > 0;
        if self.state.peer_lost(token, peers_remaining) {
            self.registry.enable_write_all_peers();
        }
    }

    fn next_timeout(&self) -> Option<Duration> {
        let timeout = self.config.peer_idle_timeout?;
        let deadline = self
            .registry
            .next_idle_deadline(timeout, self.state.engaged_peer())?;

        Some(deadline.saturating_duration_since(Instant::now()))
    }

    fn close_idle_peers(&mut self) {
        let Some(timeout) = self.config.peer_idle_timeout else {
            return;
        };

        let idle = self
            .registry
            .idle_peers(Instant::now(), timeout, self.state.engaged_peer());

        for token in idle {
            if let Some(peer) = self.registry.peer(token) {
                warn!(peer = %peer.addr, ?timeout, "peer left unserved, closing it");
            }
            self.close_peer(token);
        }
    }
}

/// EMFILE/ENFILE: the process or system ran out of descriptors. The pending
/// connection stays queued and is retried on the next readiness round.
fn is_descriptor_exhaustion(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EMFILE | libc::ENFILE))
}
