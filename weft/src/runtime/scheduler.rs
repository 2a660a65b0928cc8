use crate::error::TaskError;
use crate::log::LogSink;
use crate::runtime::builder::SchedulerBuilder;
use crate::runtime::context::{self, Frame};
use crate::runtime::suspend::Suspend;
use crate::runtime::task::waker::inert_waker;
use crate::runtime::task::{Body, Payload, TaskId, TaskRecord, Unit, Value};

use indexmap::IndexMap;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::thread;
use std::time::Instant;

/// Single-threaded cooperative task scheduler.
///
/// The scheduler owns the live set of task records and runs the resume
/// loop. Each tick resumes, in insertion order, every live task whose
/// wake-at has passed, then interprets the suspension request the task
/// left behind:
///
/// - a timed wait keeps it live with a new wake-at,
/// - a nested unit parks it until the child (registered with this task as
///   its parent) completes,
/// - a bridge detaches it until the bridge is resolved,
/// - a plain yield keeps it live for the next tick.
///
/// Completion results and errors flow to the parent task. An error with no
/// parent is reported to the [`LogSink`] and ends only that task. A panic in
/// a task body is caught and treated as that task failing with
/// [`TaskError::Panicked`].
///
/// `Scheduler` is a cheap handle; clones drive the same live set.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

struct Inner {
    /// Tasks eligible to be resumed (possibly after their wake-at).
    live: RefCell<IndexMap<TaskId, TaskRecord>>,

    /// Parents waiting for a nested unit, keyed by their own id.
    parked: RefCell<HashMap<TaskId, TaskRecord>>,

    sink: Rc<dyn LogSink>,
}

impl Scheduler {
    /// Creates a scheduler that reports through `tracing`.
    pub fn new() -> Self {
        SchedulerBuilder::new().build()
    }

    /// Returns a builder to configure a scheduler.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Returns the scheduler running the current task, if any.
    pub fn current() -> Option<Self> {
        context::current_scheduler()
    }

    pub(crate) fn with_sink(sink: Rc<dyn LogSink>) -> Self {
        Self {
            inner: Rc::new(Inner {
                live: RefCell::new(IndexMap::new()),
                parked: RefCell::new(HashMap::new()),
                sink,
            }),
        }
    }

    /// Returns the sink this scheduler reports to.
    pub fn sink(&self) -> Rc<dyn LogSink> {
        self.inner.sink.clone()
    }

    /// Admits a unit as a top-level task.
    ///
    /// The task has no pending value, is eligible immediately, and first
    /// runs on the tick after the current one when called from inside a
    /// task. Its result is discarded; an error is reported to the sink.
    pub fn register<T: 'static>(&self, unit: Unit<T>) -> TaskId {
        self.admit(unit.into_body(), None)
    }

    fn admit(&self, body: Body, parent: Option<TaskId>) -> TaskId {
        let record = TaskRecord::new(body, parent);
        let id = record.id();

        tracing::trace!(task = %id, parent = ?parent, "task registered");

        self.inner.live.borrow_mut().insert(id, record);
        id
    }

    /// Puts a detached task back into the live set with a value to return
    /// from its suspension point.
    pub fn resume(&self, task: TaskRecord, value: Value) {
        self.deliver(task, Payload::Value(value));
    }

    /// Puts a detached task back into the live set with an error to raise
    /// at its suspension point.
    pub fn resume_with_error(&self, task: TaskRecord, error: TaskError) {
        self.deliver(task, Payload::Error(error));
    }

    pub(crate) fn deliver(&self, mut task: TaskRecord, payload: Payload) {
        task.pending = payload;
        task.wake_at = None;

        self.inner.live.borrow_mut().insert(task.id(), task);
    }

    /// Returns `true` if the task is in the live set.
    ///
    /// Tasks parked behind a nested unit or detached to a bridge are not live.
    pub fn is_live(&self, id: TaskId) -> bool {
        self.inner.live.borrow().contains_key(&id)
    }

    /// Returns the number of tasks in the live set.
    pub fn live_count(&self) -> usize {
        self.inner.live.borrow().len()
    }

    /// Returns `true` if any live task other than `id` could be resumed now.
    pub fn has_runnable_except(&self, id: TaskId) -> bool {
        let now = Instant::now();

        self.inner
            .live
            .borrow()
            .values()
            .any(|record| record.id() != id && record.is_eligible(now))
    }

    /// Returns the earliest wake-at among live tasks other than `id` that
    /// are waiting for time to pass.
    pub(crate) fn next_wake_except(&self, id: TaskId) -> Option<Instant> {
        self.inner
            .live
            .borrow()
            .values()
            .filter(|record| record.id() != id)
            .filter_map(|record| record.wake_at)
            .min()
    }

    /// Runs the resume loop until the live set is empty.
    ///
    /// Task errors and panics never escape this call.
    pub fn run_forever(&self) {
        while self.tick() {
            self.idle();
        }

        tracing::trace!("live set empty; scheduler stopped");
    }

    /// Drives the scheduler until `future` completes and returns its output.
    ///
    /// `future` runs as a top-level task alongside everything else in the
    /// live set.
    ///
    /// # Panics
    ///
    /// Panics if the live set drains before `future` completes (it was left
    /// waiting on a bridge nobody resolves).
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let slot = Rc::new(RefCell::new(None));
        let out = slot.clone();

        // A panic in `future` is carried out of the loop and resumed on the
        // caller, instead of being reported as a task failure.
        self.register(Unit::new(async move {
            let output = CatchUnwind(Box::pin(future)).await;
            *out.borrow_mut() = Some(output);
            Ok(())
        }));

        while slot.borrow().is_none() {
            if !self.tick() {
                break;
            }
            self.idle();
        }

        let output = slot.borrow_mut().take();

        match output.expect("block_on: task never completed") {
            Ok(output) => output,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Runs one pass over a snapshot of the live set.
    ///
    /// Returns `false` without doing anything if the live set is empty.
    /// Tasks registered or resumed during the pass run on the next one.
    pub fn tick(&self) -> bool {
        let snapshot: Vec<TaskId> = self.inner.live.borrow().keys().copied().collect();

        if snapshot.is_empty() {
            return false;
        }

        context::enter_context(self, || {
            for id in snapshot {
                self.step(id);
            }
        });

        true
    }

    /// Sleeps until the earliest wake-at when no live task can run now.
    fn idle(&self) {
        let now = Instant::now();

        let earliest = {
            let live = self.inner.live.borrow();

            if live.values().any(|record| record.is_eligible(now)) {
                return;
            }

            live.values().filter_map(|record| record.wake_at).min()
        };

        if let Some(at) = earliest {
            thread::sleep(at.saturating_duration_since(now));
        }
    }

    fn step(&self, id: TaskId) {
        let (mut body, payload) = {
            let mut live = self.inner.live.borrow_mut();

            let Some(record) = live.get_mut(&id) else {
                return;
            };

            if !record.is_eligible(Instant::now()) {
                return;
            }

            let Some(body) = record.body.take() else {
                return;
            };

            (body, std::mem::take(&mut record.pending))
        };

        let waker = inert_waker();
        let mut cx = Context::from_waker(&waker);

        let polled = panic::catch_unwind(AssertUnwindSafe(|| {
            context::enter_frame(Frame::new(id, payload), || body.as_mut().poll(&mut cx))
        }));

        match polled {
            Ok((Poll::Ready(Ok(value)), _)) => self.complete(id, Payload::Value(value)),
            Ok((Poll::Ready(Err(error)), _)) => self.complete(id, Payload::Error(error)),
            Ok((Poll::Pending, frame)) => {
                let request = frame.request.unwrap_or(Suspend::Value(None));
                self.suspend(id, body, request);
            }
            Err(payload) => {
                let error = TaskError::from_panic(payload);
                tracing::debug!(task = %id, %error, "task body panicked");

                // Dropping the body may run destructors of a half-finished future.
                if panic::catch_unwind(AssertUnwindSafe(move || drop(body))).is_err() {
                    tracing::warn!(task = %id, "panicked while dropping a panicked task");
                }

                self.complete(id, Payload::Error(error));
            }
        }
    }

    fn complete(&self, id: TaskId, outcome: Payload) {
        let Some(record) = self.inner.live.borrow_mut().shift_remove(&id) else {
            return;
        };

        match (record.parent(), outcome) {
            (Some(parent), outcome) => {
                tracing::trace!(
                    task = %id,
                    parent = %parent,
                    error = outcome.is_error(),
                    "task completed"
                );
                self.wake_parent(parent, outcome);
            }
            (None, Payload::Error(error)) => {
                tracing::trace!(task = %id, "task failed");
                self.inner.sink.task_failed(id, &error);
            }
            (None, _) => {
                tracing::trace!(task = %id, "task completed");
            }
        }
    }

    fn wake_parent(&self, parent: TaskId, outcome: Payload) {
        let record = self.inner.parked.borrow_mut().remove(&parent);

        match record {
            Some(record) => self.deliver(record, outcome),
            None => tracing::warn!(task = %parent, "completed child has no parked parent"),
        }
    }

    fn suspend(&self, id: TaskId, body: Body, request: Suspend) {
        match request {
            Suspend::Wait(duration) => {
                let mut live = self.inner.live.borrow_mut();

                if let Some(record) = live.get_mut(&id) {
                    record.body = Some(body);
                    record.pending = Payload::Empty;
                    record.wake_at = Some(Instant::now() + duration);
                }
            }
            Suspend::Value(value) => {
                let mut live = self.inner.live.borrow_mut();

                if let Some(record) = live.get_mut(&id) {
                    record.body = Some(body);
                    record.pending = value.map_or(Payload::Empty, Payload::Value);
                    record.wake_at = None;
                }
            }
            Suspend::Nested(child) => {
                let Some(mut record) = self.inner.live.borrow_mut().shift_remove(&id) else {
                    return;
                };

                record.body = Some(body);
                self.inner.parked.borrow_mut().insert(id, record);

                self.admit(child, Some(id));
            }
            Suspend::Bridge(bridge) => {
                let Some(mut record) = self.inner.live.borrow_mut().shift_remove(&id) else {
                    return;
                };

                record.body = Some(body);

                tracing::trace!(task = %id, "task detached to a bridge");
                bridge.attach(self, record);
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("live", &self.inner.live.borrow().len())
            .field("parked", &self.inner.parked.borrow().len())
            .finish_non_exhaustive()
    }
}

struct CatchUnwind<F>(Pin<Box<F>>);

impl<F: Future> Future for CatchUnwind<F> {
    type Output = thread::Result<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.0.as_mut().poll(cx))) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

/// Registers a top-level task with the scheduler running the current task.
///
/// # Panics
///
/// Panics if called outside of a running scheduler.
pub fn spawn<T: 'static>(unit: Unit<T>) -> TaskId {
    context::current_scheduler()
        .expect("spawn must be called from inside a running weft scheduler")
        .register(unit)
}
