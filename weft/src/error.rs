//! Error types shared by the scheduler, the bridge and the transport layer.
//!
//! Every failure that travels through a task resumption is a [`TaskError`].
//! A task body raises one by returning `Err`; the scheduler either hands it
//! to the waiting parent (where it surfaces at the parent's `.await`) or,
//! for a top-level task, reports it to the log sink.

use std::any::Any;
use std::io;

use thiserror::Error;

/// An error carried through a task resumption.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A socket or poller operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A continuation bridge was used outside of its one-shot contract.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// An inbound request could not be parsed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The delivered value had a different type than the suspension point awaited.
    #[error("resumed with a value of an unexpected type (expected `{expected}`)")]
    TypeMismatch { expected: &'static str },

    /// A value-returning suspension point was resumed without a value.
    #[error("resumed without a value")]
    MissingValue,

    /// A task body panicked while it was being resumed.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Application-level failure raised by a task body.
    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    /// Creates an application failure with the given message.
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }

    /// Builds a [`TaskError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        TaskError::Panicked(message)
    }

    /// Returns `true` if the task body panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }

    /// Returns the underlying I/O error kind, if this is an I/O failure.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            TaskError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}

/// Contract violations of a continuation bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("bridge already resolved")]
    AlreadyResolved,

    #[error("bridge already has a waiting task")]
    AlreadyAttached,
}

/// Failures of the minimal HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("malformed request: {0}")]
    Malformed(&'static str),

    #[error("request head is not valid UTF-8")]
    Encoding,
}
