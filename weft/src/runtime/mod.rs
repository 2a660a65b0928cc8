//! Core runtime components.
//!
//! This module contains the cooperative scheduler and everything a task
//! body uses to talk to it:
//! - task records and the [`Unit`](task::Unit) wrapper,
//! - the suspension channel between a running body and the scheduler,
//! - the one-shot continuation [`Bridge`](bridge::Bridge),
//! - runtime context (current scheduler, current task).
//!
//! Everything here is single-threaded. Handles are `Rc`-based and are
//! neither `Send` nor `Sync`.

pub(crate) mod bridge;
pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod scheduler;
pub(crate) mod suspend;
pub(crate) mod yield_now;

pub mod task;
