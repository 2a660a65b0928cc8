//! Task records and suspendable units.
//!
//! - [`Unit`]: a suspendable unit of work, built from an async block,
//! - [`TaskRecord`]: the scheduler's bookkeeping for a registered unit,
//! - [`TaskId`]: the stable identity of a task.

mod core;
mod id;
mod unit;

pub(crate) mod waker;

pub(crate) use self::core::{Body, Payload};

pub use self::core::{TaskRecord, Value};
pub use id::TaskId;
pub use unit::{IntoUnit, Nested, Unit, from_fn};
