//! Readiness-based I/O reactor.
//!
//! The reactor maps socket readiness to callbacks and plugs into the
//! scheduler through a perpetual polling task:
//! - descriptors are registered with one [`Interest`] and a [`Callback`],
//! - the polling task waits for readiness, runs the callbacks of every
//!   ready descriptor, then yields so tasks the callbacks woke can run.
//!
//! The transport built on top (server accept/message callbacks and
//! outbound requests) lives in [`crate::net`].

mod builder;
mod core;
mod event;
mod io;

pub(crate) mod poller;

pub use builder::ReactorBuilder;
pub use self::core::{Reactor, ReactorHandle};
pub use io::Callback;
pub use poller::Interest;
