//! The relay: connection registry, relay state, and the event loop that ties
//! them to the poller.
//!
//! - [`core`]: [`Relay`], its dispatch rules and the loop
//! - [`registry`]: control, listener and peer bookkeeping with write interest
//! - [`state`]: the explicit pending-payload state and its [`Phase`]

pub mod core;
pub(crate) mod registry;
pub mod state;

pub use self::core::{Exit, Relay};
pub use state::Phase;
