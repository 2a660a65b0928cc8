use super::id::TaskId;
use crate::error::TaskError;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

/// A type-erased value handed between tasks.
///
/// Completion results, bridge outcomes and plain yielded values all travel
/// through the scheduler in this form; the awaiting suspension point
/// downcasts it back to the type it expects.
pub type Value = Box<dyn Any>;

/// The erased body of a suspendable unit of work.
pub(crate) type Body = Pin<Box<dyn Future<Output = Result<Value, TaskError>>>>;

/// The resumption payload waiting for a task.
#[derive(Default)]
pub(crate) enum Payload {
    /// Nothing to deliver (fresh task, or after a timed wait).
    #[default]
    Empty,

    /// A value to return from the suspension point.
    Value(Value),

    /// An error to raise at the suspension point.
    Error(TaskError),
}

impl Payload {
    /// Converts the payload into the result expected by a typed suspension point.
    pub(crate) fn downcast<T: 'static>(self) -> Result<T, TaskError> {
        match self {
            Payload::Value(value) => value
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|_| TaskError::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                }),
            Payload::Error(err) => Err(err),
            Payload::Empty => Err(TaskError::MissingValue),
        }
    }

    pub(crate) fn is_error(&self) -> bool {
        matches!(self, Payload::Error(_))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Value(_) => f.write_str("Value(..)"),
            Payload::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

/// The scheduler's bookkeeping for one suspended unit of work.
///
/// A record lives in the scheduler's live set from registration until the
/// unit completes, or until it is handed to a continuation bridge or parked
/// behind a nested unit. Whoever holds the record is responsible for its
/// next resumption, which is why resuming consumes it.
pub struct TaskRecord {
    pub(crate) id: TaskId,

    /// The unit itself. Taken out while the scheduler polls it.
    pub(crate) body: Option<Body>,

    /// Value or error delivered on the next resumption.
    pub(crate) pending: Payload,

    /// Task waiting for this one's result. Back-reference only.
    pub(crate) parent: Option<TaskId>,

    /// The task is not resumed before this instant.
    pub(crate) wake_at: Option<Instant>,
}

impl TaskRecord {
    pub(crate) fn new(body: Body, parent: Option<TaskId>) -> Self {
        Self {
            id: TaskId::next(),
            body: Some(body),
            pending: Payload::Empty,
            parent,
            wake_at: None,
        }
    }

    /// Returns the id of this task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task waiting for this one's result, if any.
    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    /// Returns `true` if the task may be resumed at `now`.
    pub(crate) fn is_eligible(&self, now: Instant) -> bool {
        self.wake_at.is_none_or(|at| at <= now)
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("pending", &self.pending)
            .field("parent", &self.parent)
            .field("wake_at", &self.wake_at)
            .finish_non_exhaustive()
    }
}
