//! Single-peer emulator for exercising a protocol implementation under test.
//!
//! The relay sits between a long-lived control connection (the test harness)
//! and short-lived peer connections opened by the system under test against
//! a listening address. It relays exactly one opaque payload at a time and
//! enforces strict alternation, so test traffic stays deterministic.
//!
//! # Architecture
//!
//! - **net**: non-blocking `TcpStream`/`TcpListener` over raw sockets
//! - **reactor**: `poll(2)` readiness, self-pipe waker, interrupt handler
//! - **relay**: connection registry, explicit relay state, event loop
//! - **RelayBuilder**: fluent construction from two addresses
//!
//! # Example
//!
//! ```no_run
//! use mock_peer::{Exit, RelayBuilder, install_interrupt_handler};
//!
//! let relay = RelayBuilder::new(
//!     "127.0.0.1:60001".parse().unwrap(),
//!     "127.0.0.1:60000".parse().unwrap(),
//! )
//! .build()
//! .unwrap();
//!
//! install_interrupt_handler(relay.shutdown_handle()).unwrap();
//! assert!(matches!(relay.run(), Ok(Exit::ControlClosed | Exit::Cancelled)));
//! ```

mod builder;
pub mod config;
mod error;
pub mod net;
pub mod reactor;
pub mod relay;

pub use builder::RelayBuilder;
pub use config::RelayConfig;
pub use error::{ConfigError, RelayError};
pub use reactor::signal::install_interrupt_handler;
pub use reactor::waker::ShutdownHandle;
pub use relay::{Exit, Phase, Relay};
