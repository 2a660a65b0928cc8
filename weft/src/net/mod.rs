//! Socket transport driven by the reactor.
//!
//! This module provides:
//! - [`Socket`], an owned non-blocking IPv4 stream socket,
//! - the server side ([`Reactor::start_server`](crate::Reactor::start_server)):
//!   accept and message callbacks, plus the task serving each connection,
//! - the client side ([`Reactor::request`](crate::Reactor::request)):
//!   one outbound request awaited through a continuation bridge.

mod client;
mod server;
mod socket;

pub use socket::{Socket, resolve};
