//! OS readiness poller.
//!
//! The reactor uses the poller to:
//! - block the thread until a registered descriptor becomes ready,
//! - be interrupted from another thread through an `eventfd` waker.
//!
//! Only Linux (`epoll`) is supported.

#[cfg(not(target_os = "linux"))]
compile_error!("weft's reactor is only implemented for Linux (epoll)");

pub(crate) mod common;
pub(crate) mod unix;

mod epoll;

pub use common::Interest;
pub(crate) use common::Waker;

pub(crate) type Poller = epoll::EpollPoller;

pub(crate) use unix as platform;
