//! # weft
//!
//! **weft** is a minimal cooperative-multitasking runtime: a single-threaded
//! scheduler interleaving suspendable units of work, paired with a
//! readiness-based I/O reactor that drives those units from socket events.
//!
//! Application code is written in direct style. A task suspends only at
//! explicit points:
//!
//! - a timed wait ([`time::sleep`]),
//! - awaiting a nested [`Unit`], which runs as a child task,
//! - awaiting a [`Bridge`], resolved later by a reactor callback,
//! - a plain yield ([`yield_now`]).
//!
//! Exactly one task body runs at any time. The only place the thread
//! blocks is the reactor's readiness wait, which itself runs as a task.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weft::http::{Response, Router};
//! use weft::{Reactor, Scheduler, Unit};
//!
//! fn main() -> std::io::Result<()> {
//!     let scheduler = Scheduler::new();
//!     let reactor = Reactor::new(&scheduler)?;
//!
//!     let router = Router::new().get("/", |_| Unit::ready(Response::text(200, "hello world")));
//!     reactor.start_server("localhost", 8080, router)?;
//!
//!     reactor.spawn_poller();
//!     scheduler.run_forever();
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`http`]: minimal request parsing, responses, handlers and routing
//! - [`log`]: externally observable log events and sinks
//! - [`net`]: non-blocking sockets used by the transport
//! - [`time`]: timed waits

mod error;
mod reactor;
mod runtime;

pub mod http;
pub mod log;
pub mod net;
pub mod time;

pub use error::{BridgeError, HttpError, TaskError};
pub use reactor::{Callback, Interest, Reactor, ReactorBuilder, ReactorHandle};
pub use runtime::bridge::{Bridge, BridgeWait};
pub use runtime::builder::SchedulerBuilder;
pub use runtime::context::current_task;
pub use runtime::scheduler::{Scheduler, spawn};
pub use runtime::task;
pub use runtime::task::{IntoUnit, TaskId, TaskRecord, Unit, Value, from_fn};
pub use runtime::yield_now::{YieldNow, YieldValue, yield_now, yield_value};

pub use weft_macros::{main, test};
