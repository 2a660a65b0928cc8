//! Time-related suspension points.
//!
//! - [`sleep`] suspends the current task for at least a duration,
//! - [`instrumented`] measures how long a future took from its first poll.

mod instrumented;
mod sleep;

#[doc(inline)]
pub use instrumented::{Instrumented, instrumented};

#[doc(inline)]
pub use sleep::{Sleep, sleep};
