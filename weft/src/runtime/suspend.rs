use crate::runtime::bridge::Attach;
use crate::runtime::context;
use crate::runtime::task::{Body, Payload, Value};

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

/// What a task asks the scheduler for when it suspends.
pub(crate) enum Suspend {
    /// Do not resume before the duration has elapsed.
    Wait(Duration),

    /// Detach until the bridge delivers an outcome.
    Bridge(Rc<dyn Attach>),

    /// Run the nested unit as a child and resume with its result.
    Nested(Body),

    /// Stay live; the value (if any) is handed back on the next resumption.
    Value(Option<Value>),
}

/// The future behind every suspension point.
///
/// The first poll submits the request and returns `Pending`. The scheduler
/// only polls the task again once the request has been honoured, so the
/// second poll picks up the delivered payload.
pub(crate) struct Suspension {
    request: Option<Suspend>,
}

impl Suspension {
    pub(crate) fn new(request: Suspend) -> Self {
        Self {
            request: Some(request),
        }
    }
}

impl Future for Suspension {
    type Output = Payload;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(request) = this.request.take() {
            context::submit(request);
            return Poll::Pending;
        }

        Poll::Ready(context::take_resume())
    }
}
