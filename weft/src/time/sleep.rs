use crate::runtime::suspend::{Suspend, Suspension};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Creates a timed wait.
///
/// The task asks the scheduler not to resume it before `duration` has
/// elapsed. A zero duration still suspends: the task comes back on the next
/// tick, after every other task in the current one.
///
/// While the reactor blocks in its readiness wait, an expired wait is only
/// noticed once some socket becomes ready.
///
/// # Panics
///
/// Panics if awaited outside of a weft task.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// weft::time::sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        inner: Suspension::new(Suspend::Wait(duration)),
    }
}

/// Future returned by [`sleep`].
pub struct Sleep {
    inner: Suspension,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|_| ())
    }
}
