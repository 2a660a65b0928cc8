use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Wraps a future and measures the wall-clock time until it completes.
///
/// The clock starts on the first poll, which for a task body is the moment
/// the scheduler first resumes it. Time spent suspended (timed waits,
/// nested units, bridges) is included.
///
/// # Examples
///
/// ```rust,ignore
/// let (response, elapsed) = instrumented(reactor.request("127.0.0.1", 8080, "/", "GET")).await;
/// ```
pub fn instrumented<F: IntoFuture>(future: F) -> Instrumented<F::IntoFuture> {
    Instrumented {
        future: future.into_future(),
        start: None,
    }
}

/// Future returned by [`instrumented`].
pub struct Instrumented<F> {
    future: F,
    start: Option<Instant>,
}

impl<F: Future> Future for Instrumented<F> {
    type Output = (F::Output, Duration);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: `future` is structurally pinned and never moved out;
        // `start` is plain data.
        let this = unsafe { self.get_unchecked_mut() };

        let start = *this.start.get_or_insert_with(Instant::now);
        let future = unsafe { Pin::new_unchecked(&mut this.future) };

        future.poll(cx).map(|output| (output, start.elapsed()))
    }
}
