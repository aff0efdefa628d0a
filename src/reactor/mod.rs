//! Readiness primitives for the relay's single-threaded event loop.
//!
//! This module provides:
//! - [`event`]: readiness [`Event`](event::Event)s, [`Interest`](event::Interest) and [`Token`](event::Token)
//! - [`poller`]: the `poll(2)` based [`Poller`](poller::Poller), the loop's only blocking point
//! - [`waker`]: a self-pipe that interrupts a blocked poll from another thread
//! - [`signal`]: routes SIGINT/SIGTERM into the waker

pub mod event;
pub mod poller;
pub mod signal;
pub mod waker;
