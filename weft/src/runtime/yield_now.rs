use crate::runtime::suspend::{Suspend, Suspension};
use crate::runtime::task::{Payload, Value};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A plain yield: the task stays live and runs again on the next tick.
pub struct YieldNow {
    inner: Suspension,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|_| ())
    }
}

/// Yields execution back to the scheduler.
///
/// Every other eligible task in the current tick gets its turn before this
/// one continues. Tasks spawned in the meantime run first only if they were
/// registered before the next tick started.
///
/// # Examples
///
/// ```rust,ignore
/// async fn task() -> Result<(), weft::TaskError> {
///     // Let the rest of the live set make progress
///     weft::yield_now().await;
///     Ok(())
/// }
/// ```
pub fn yield_now() -> YieldNow {
    YieldNow {
        inner: Suspension::new(Suspend::Value(None)),
    }
}

/// A plain yield carrying a value, see [`yield_value`].
pub struct YieldValue {
    inner: Suspension,
}

impl Future for YieldValue {
    type Output = Option<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|payload| match payload {
            Payload::Value(value) => Some(value),
            _ => None,
        })
    }
}

/// Yields a plain value to the scheduler.
///
/// The scheduler stores the value as the task's own pending value and keeps
/// the task live, so the value comes straight back on the next resumption.
pub fn yield_value(value: Value) -> YieldValue {
    YieldValue {
        inner: Suspension::new(Suspend::Value(Some(value))),
    }
}
