use crate::runtime::scheduler::Scheduler;
use crate::runtime::suspend::Suspend;
use crate::runtime::task::{Payload, TaskId};

use std::cell::RefCell;

/// Per-resumption state shared between the scheduler and the task body.
///
/// The scheduler installs a frame before polling a task; the suspension point
/// the body is parked on takes the delivered payload from it, and the next
/// suspension point it reaches leaves its request in it.
pub(crate) struct Frame {
    pub(crate) task: TaskId,
    pub(crate) resume: Payload,
    pub(crate) request: Option<Suspend>,
}

impl Frame {
    pub(crate) fn new(task: TaskId, resume: Payload) -> Self {
        Self {
            task,
            resume,
            request: None,
        }
    }
}

thread_local! {
    /// Scheduler currently running a tick on this thread.
    ///
    /// Lets task bodies spawn new tasks without carrying a handle around.
    pub(crate) static CURRENT_SCHEDULER: RefCell<Option<Scheduler>> =
        const { RefCell::new(None) };

    /// Frame of the task currently being resumed.
    pub(crate) static CURRENT_FRAME: RefCell<Option<Frame>> = const { RefCell::new(None) };
}

/// Installs `scheduler` as the current scheduler for the duration of `f`.
///
/// The previous value is restored afterwards, also when `f` unwinds, so
/// nested entries (a task driving another scheduler) behave.
pub(crate) fn enter_context<R>(scheduler: &Scheduler, f: impl FnOnce() -> R) -> R {
    struct Reset(Option<Scheduler>);

    impl Drop for Reset {
        fn drop(&mut self) {
            let previous = self.0.take();
            CURRENT_SCHEDULER.with(|cell| cell.replace(previous));
        }
    }

    let previous = CURRENT_SCHEDULER.with(|cell| cell.replace(Some(scheduler.clone())));
    let _reset = Reset(previous);

    f()
}

/// Runs `f` with `frame` installed and hands the frame back afterwards.
///
/// If `f` unwinds, the frame is discarded and the previous one restored.
pub(crate) fn enter_frame<R>(frame: Frame, f: impl FnOnce() -> R) -> (R, Frame) {
    struct Reset {
        previous: Option<Frame>,
        armed: bool,
    }

    impl Drop for Reset {
        fn drop(&mut self) {
            if self.armed {
                let previous = self.previous.take();
                CURRENT_FRAME.with(|cell| cell.replace(previous));
            }
        }
    }

    let previous = CURRENT_FRAME.with(|cell| cell.replace(Some(frame)));
    let mut reset = Reset {
        previous,
        armed: true,
    };

    let out = f();

    reset.armed = false;
    let previous = reset.previous.take();

    let frame = CURRENT_FRAME
        .with(|cell| cell.replace(previous))
        .expect("task frame removed while the task was running");

    (out, frame)
}

/// Leaves a suspension request for the scheduler.
///
/// # Panics
///
/// Panics outside of a task, or if the task already submitted a request
/// during this resumption.
pub(crate) fn submit(request: Suspend) {
    CURRENT_FRAME.with(|cell| {
        let mut binding = cell.borrow_mut();
        let frame = binding
            .as_mut()
            .expect("suspension point reached outside of a weft task");

        assert!(
            frame.request.is_none(),
            "a task may only suspend on one request at a time"
        );

        frame.request = Some(request);
    });
}

/// Takes the payload delivered with the current resumption.
pub(crate) fn take_resume() -> Payload {
    CURRENT_FRAME.with(|cell| {
        let mut binding = cell.borrow_mut();
        let frame = binding
            .as_mut()
            .expect("suspension point resumed outside of a weft task");

        std::mem::take(&mut frame.resume)
    })
}

/// Returns the id of the task currently being resumed on this thread.
pub fn current_task() -> Option<TaskId> {
    CURRENT_FRAME.with(|cell| cell.borrow().as_ref().map(|frame| frame.task))
}

pub(crate) fn current_scheduler() -> Option<Scheduler> {
    CURRENT_SCHEDULER.with(|cell| cell.borrow().clone())
}
