//! One-shot continuation bridge.
//!
//! A [`Bridge`] connects an event that happens in some other control
//! context (typically a reactor callback) back to the one task waiting for
//! it. The task awaits the bridge and is detached from the scheduler; the
//! callback later resolves the bridge with a value or an error, which puts
//! the task back into the live set with that outcome.
//!
//! Resolution and attachment may happen in either order. If the outcome
//! arrives first it is queued and delivered on attach.

use crate::error::{BridgeError, TaskError};
use crate::runtime::scheduler::Scheduler;
use crate::runtime::suspend::{Suspend, Suspension};
use crate::runtime::task::{Payload, TaskRecord, Value};

use std::cell::RefCell;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// The scheduler-facing side of a bridge.
///
/// The scheduler hands a task record to the bridge its body is awaiting
/// without knowing what the bridge carries.
pub(crate) trait Attach {
    fn attach(&self, scheduler: &Scheduler, task: TaskRecord);
}

enum State {
    /// No task and no outcome yet.
    Created,

    /// A task is waiting for the outcome.
    Armed {
        scheduler: Scheduler,
        task: TaskRecord,
    },

    /// The outcome arrived before any task attached.
    Queued(Payload),

    /// The outcome has been delivered.
    Resolved,
}

struct Shared {
    state: RefCell<State>,
}

impl Shared {
    #[track_caller]
    fn settle(&self, payload: Payload) -> Result<(), BridgeError> {
        let mut state = self.state.borrow_mut();

        match mem::replace(&mut *state, State::Resolved) {
            State::Created => {
                *state = State::Queued(payload);
                Ok(())
            }
            State::Armed { scheduler, task } => {
                drop(state);
                tracing::trace!(task = %task.id(), error = payload.is_error(), "bridge resolved");
                scheduler.deliver(task, payload);
                Ok(())
            }
            previous @ (State::Queued(_) | State::Resolved) => {
                *state = previous;
                drop(state);

                if cfg!(debug_assertions) {
                    panic!("bridge resolved twice");
                }

                tracing::error!("bridge resolved twice; keeping the first outcome");
                Err(BridgeError::AlreadyResolved)
            }
        }
    }
}

impl Attach for Shared {
    fn attach(&self, scheduler: &Scheduler, task: TaskRecord) {
        let mut state = self.state.borrow_mut();

        match mem::replace(&mut *state, State::Resolved) {
            State::Created => {
                *state = State::Armed {
                    scheduler: scheduler.clone(),
                    task,
                };
            }
            State::Queued(payload) => {
                drop(state);
                scheduler.deliver(task, payload);
            }
            previous @ State::Armed { .. } => {
                *state = previous;
                drop(state);

                tracing::debug!(task = %task.id(), "second task attached to a bridge");
                scheduler.deliver(task, Payload::Error(BridgeError::AlreadyAttached.into()));
            }
            State::Resolved => {
                drop(state);

                // The outcome went to an earlier task.
                tracing::debug!(task = %task.id(), "task attached to a resolved bridge");
                scheduler.deliver(task, Payload::Error(BridgeError::AlreadyResolved.into()));
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let State::Armed { task, .. } = self.state.get_mut() {
            tracing::warn!(
                task = %task.id(),
                "bridge dropped unresolved; its task will never resume"
            );
        }
    }
}

/// A one-shot adapter delivering exactly one outcome into one waiting task.
///
/// Clones share the same bridge: one clone is awaited by the task, another
/// is kept by whoever produces the outcome.
///
/// # Examples
///
/// ```rust,ignore
/// let bridge = Bridge::<u32>::new();
/// let producer = bridge.clone();
///
/// scheduler.register(Unit::new(async move {
///     let value = bridge.await?;
///     Ok(value)
/// }));
///
/// // later, from a reactor callback
/// producer.resolve(7)?;
/// ```
pub struct Bridge<T> {
    shared: Rc<Shared>,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: 'static> Bridge<T> {
    /// Creates an unresolved bridge with no waiting task.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(State::Created),
            }),
            _marker: PhantomData,
        }
    }

    /// Delivers a value to the waiting task.
    ///
    /// # Panics
    ///
    /// Resolving a bridge twice is a defect; debug builds panic. Release
    /// builds keep the first outcome and return
    /// [`BridgeError::AlreadyResolved`].
    #[track_caller]
    pub fn resolve(&self, value: T) -> Result<(), BridgeError> {
        self.shared.settle(Payload::Value(Box::new(value) as Value))
    }

    /// Delivers an error, raised at the waiting task's `.await`.
    ///
    /// # Panics
    ///
    /// Same contract as [`resolve`](Self::resolve).
    #[track_caller]
    pub fn resolve_with_error(&self, error: impl Into<TaskError>) -> Result<(), BridgeError> {
        self.shared.settle(Payload::Error(error.into()))
    }

    /// Returns `true` once an outcome has been supplied.
    pub fn is_resolved(&self) -> bool {
        matches!(
            *self.shared.state.borrow(),
            State::Queued(_) | State::Resolved
        )
    }

    /// Returns `true` while a task is attached and waiting.
    pub fn is_armed(&self) -> bool {
        matches!(*self.shared.state.borrow(), State::Armed { .. })
    }
}

impl<T: 'static> Default for Bridge<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Bridge<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Bridge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.shared.state.borrow() {
            State::Created => "created",
            State::Armed { .. } => "armed",
            State::Queued(_) => "queued",
            State::Resolved => "resolved",
        };

        f.debug_struct("Bridge").field("state", &state).finish()
    }
}

impl<T: 'static> IntoFuture for Bridge<T> {
    type Output = Result<T, TaskError>;
    type IntoFuture = BridgeWait<T>;

    fn into_future(self) -> Self::IntoFuture {
        BridgeWait {
            inner: Suspension::new(Suspend::Bridge(self.shared)),
            _marker: PhantomData,
        }
    }
}

/// Suspension point awaiting a [`Bridge`].
pub struct BridgeWait<T> {
    inner: Suspension,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Future for BridgeWait<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|payload| payload.downcast::<T>())
    }
}
