//! Explicit relay state.
//!
//! The pending payload lives inside the variant that owns it, so "at most one
//! payload in flight" and "exactly one direction per payload" hold by
//! construction.

use crate::reactor::event::Token;

/// The single pending-payload slot and where it is headed.
#[derive(Debug, Default)]
pub(crate) enum RelayState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Payload read from control; no peer connected yet.
    AwaitingPeerAccept { payload: Vec<u8> },
    /// Payload read from control; peers are write-interested.
    ///
    /// `target` is set once a write has started on a peer. `written` counts
    /// bytes already handed to it.
    AwaitingPeerSend {
        payload: Vec<u8>,
        written: usize,
        target: Option<Token>,
    },
    /// Payload delivered and the receiving peer closed; waiting for the next
    /// peer to speak or for control to start a new cycle.
    AwaitingPeerRecv,
    /// Payload read from `source`; control is write-interested.
    AwaitingControlSend {
        payload: Vec<u8>,
        written: usize,
        source: Token,
    },
}

/// Observable phase of a [`Relay`](crate::Relay), without the payload bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No payload pending.
    Idle,
    /// A control payload is held until a peer connects.
    AwaitingPeerAccept,
    /// A control payload is being written to a peer.
    AwaitingPeerSend,
    /// A delivery just finished. Behaves like `Idle`.
    AwaitingPeerRecv,
    /// A peer payload is being written to control.
    AwaitingControlSend,
}

impl RelayState {
    pub(crate) fn phase(&self) -> Phase {
        match self {
            RelayState::Idle => Phase::Idle,
            RelayState::AwaitingPeerAccept { .. } => Phase::AwaitingPeerAccept,
            RelayState::AwaitingPeerSend { .. } => Phase::AwaitingPeerSend,
            RelayState::AwaitingPeerRecv => Phase::AwaitingPeerRecv,
            RelayState::AwaitingControlSend { .. } => Phase::AwaitingControlSend,
        }
    }

    /// `true` when the payload slot is empty and a new payload may be captured.
    pub(crate) fn is_vacant(&self) -> bool {
        matches!(self, RelayState::Idle | RelayState::AwaitingPeerRecv)
    }

    pub(crate) fn pending_len(&self) -> Option<usize> {
        match self {
            RelayState::AwaitingPeerAccept { payload }
            | RelayState::AwaitingPeerSend { payload, .. }
            | RelayState::AwaitingControlSend { payload, .. } => Some(payload.len()),
            RelayState::Idle | RelayState::AwaitingPeerRecv => None,
        }
    }

    /// Peers that an idle sweep must not close.
    pub(crate) fn engaged_peer(&self) -> Option<Token> {
        match self {
            RelayState::AwaitingPeerSend { target, .. } => *target,
            RelayState::AwaitingControlSend { source, .. } => Some(*source),
            _ => None,
        }
    }

    /// Captures a payload read from control.
    ///
    /// Returns `false`, leaving the state untouched, when the slot is occupied.
    pub(crate) fn capture_from_control(&mut self, payload: Vec<u8>, peers_connected: bool) -> bool {
        if !self.is_vacant() {
            return false;
        }

        *self = if peers_connected {
            RelayState::AwaitingPeerSend {
                payload,
                written: 0,
                target: None,
            }
        } else {
            RelayState::AwaitingPeerAccept { payload }
        };

        true
    }

    /// Captures a payload read from peer `source`.
    ///
    /// Returns `false`, leaving the state untouched, when the slot is occupied.
    pub(crate) fn capture_from_peer(&mut self, payload: Vec<u8>, source: Token) -> bool {
        if !self.is_vacant() {
            return false;
        }

        *self = RelayState::AwaitingControlSend {
            payload,
            written: 0,
            source,
        };

        true
    }

    /// A peer was accepted. Returns `true` if it should become write-interested.
    pub(crate) fn peer_accepted(&mut self) -> bool {
        match std::mem::take(self) {
            RelayState::AwaitingPeerAccept { payload } => {
                *self = RelayState::AwaitingPeerSend {
                    payload,
                    written: 0,
                    target: None,
                };
                true
            }
            other => {
                let unclaimed = matches!(other, RelayState::AwaitingPeerSend { target: None, .. });
                *self = other;
                unclaimed
            }
        }
    }

    /// A peer went away before the cycle finished.
    ///
    /// If it was the delivery target, the payload is rewound so the next peer
    /// receives it whole. Returns `true` when the remaining peers should be made
    /// write-interested again.
    pub(crate) fn peer_lost(&mut self, token: Token, peers_remaining: bool) -> bool {
        match std::mem::take(self) {
            RelayState::AwaitingPeerSend {
                payload, target, ..
            } if target == Some(token) || (target.is_none() && !peers_remaining) => {
                if peers_remaining {
                    *self = RelayState::AwaitingPeerSend {
                        payload,
                        written: 0,
                        target: None,
                    };
                    true
                } else {
                    *self = RelayState::AwaitingPeerAccept { payload };
                    false
                }
            }
            other => {
                *self = other;
                false
            }
        }
    }
}
