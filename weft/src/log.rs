//! Externally observable log events.
//!
//! The runtime reports the events callers may want to see: unhandled task
//! errors, failed request handlers, completed outbound requests and served
//! inbound requests. They go through a [`LogSink`] chosen when the scheduler is
//! built. [`TracingSink`] (the default) forwards them to `tracing`;
//! [`MemorySink`] keeps them in memory for inspection.

use crate::error::TaskError;
use crate::runtime::task::TaskId;

use std::cell::RefCell;
use std::fmt;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

/// One finished outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRecord {
    pub method: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub elapsed: Duration,

    /// `false` when the awaiting task received an error.
    pub ok: bool,
}

impl OutboundRecord {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for OutboundRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP {} http://{}:{}{} {:.1}ms",
            self.method,
            self.host,
            self.port,
            self.path,
            self.elapsed_ms()
        )?;

        if !self.ok {
            f.write_str(" (failed)")?;
        }

        Ok(())
    }
}

/// One inbound request answered by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServedRecord {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub peer: SocketAddr,
    pub elapsed: Duration,
}

impl ServedRecord {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for ServedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {:.2}ms",
            self.status,
            self.method,
            self.path,
            self.peer,
            self.elapsed_ms()
        )
    }
}

/// A request handler that failed; its request was answered with `500`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    pub method: String,
    pub path: String,
    pub message: String,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failed: {}", self.method, self.path, self.message)
    }
}

/// Receiver of the runtime's externally observable events.
pub trait LogSink {
    /// A top-level task ended with an error nobody handled.
    fn task_failed(&self, task: TaskId, error: &TaskError);

    /// A request handler raised an error or panicked.
    fn handler_failed(&self, failure: &HandlerFailure);

    /// An outbound request reached a terminal state.
    fn request_completed(&self, record: &OutboundRecord);

    /// An inbound request was answered.
    fn request_served(&self, record: &ServedRecord);
}

/// Forwards every event to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn task_failed(&self, task: TaskId, error: &TaskError) {
        tracing::error!(task = %task, error = %error, "unhandled task error");
    }

    fn handler_failed(&self, failure: &HandlerFailure) {
        tracing::error!(
            method = %failure.method,
            path = %failure.path,
            error = %failure.message,
            "handler failed"
        );
    }

    fn request_completed(&self, record: &OutboundRecord) {
        tracing::info!(
            method = %record.method,
            host = %record.host,
            port = record.port,
            path = %record.path,
            elapsed_ms = record.elapsed_ms(),
            ok = record.ok,
            "{record}"
        );
    }

    fn request_served(&self, record: &ServedRecord) {
        tracing::info!(
            status = record.status,
            method = %record.method,
            path = %record.path,
            peer = %record.peer,
            elapsed_ms = record.elapsed_ms(),
            "{record}"
        );
    }
}

/// An event captured by [`MemorySink`].
#[derive(Debug)]
pub enum LogEvent {
    TaskFailed { task: TaskId, message: String },
    HandlerFailed(HandlerFailure),
    RequestCompleted(OutboundRecord),
    RequestServed(ServedRecord),
}

/// Records events in memory.
///
/// Clones share the same buffer, so one clone can be given to the scheduler
/// while another is kept to inspect what was logged.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    events: Rc<RefCell<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of every unhandled task error, in order.
    pub fn failures(&self) -> Vec<(TaskId, String)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                LogEvent::TaskFailed { task, message } => Some((*task, message.clone())),
                _ => None,
            })
            .collect()
    }

    /// Every failed request handler, in order.
    pub fn handler_failures(&self) -> Vec<HandlerFailure> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                LogEvent::HandlerFailed(failure) => Some(failure.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every completed outbound request, in order.
    pub fn outbound(&self) -> Vec<OutboundRecord> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                LogEvent::RequestCompleted(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every served inbound request, in order.
    pub fn served(&self) -> Vec<ServedRecord> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                LogEvent::RequestServed(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl LogSink for MemorySink {
    fn task_failed(&self, task: TaskId, error: &TaskError) {
        self.events.borrow_mut().push(LogEvent::TaskFailed {
            task,
            message: error.to_string(),
        });
    }

    fn handler_failed(&self, failure: &HandlerFailure) {
        self.events
            .borrow_mut()
            .push(LogEvent::HandlerFailed(failure.clone()));
    }

    fn request_completed(&self, record: &OutboundRecord) {
        self.events
            .borrow_mut()
            .push(LogEvent::RequestCompleted(record.clone()));
    }

    fn request_served(&self, record: &ServedRecord) {
        self.events
            .borrow_mut()
            .push(LogEvent::RequestServed(record.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn test_outbound_record_display() {
        let record = OutboundRecord {
            method: "GET".into(),
            host: "localhost".into(),
            port: 8080,
            path: "/".into(),
            elapsed: Duration::from_micros(1500),
            ok: true,
        };

        assert_eq!(record.to_string(), "HTTP GET http://localhost:8080/ 1.5ms");

        let failed = OutboundRecord { ok: false, ..record };
        assert!(failed.to_string().ends_with("(failed)"));
    }

    #[test]
    fn test_served_record_display() {
        let record = ServedRecord {
            method: "POST".into(),
            path: "/items".into(),
            status: 201,
            peer: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5000).into(),
            elapsed: Duration::from_millis(3),
        };

        assert_eq!(record.to_string(), "201 POST /items 127.0.0.1:5000 3.00ms");
    }

    #[test]
    fn test_memory_sink_shares_buffer_between_clones() {
        let sink = MemorySink::new();
        let observer = sink.clone();

        sink.task_failed(TaskId::next(), &TaskError::msg("boom"));

        assert_eq!(observer.len(), 1);
        assert_eq!(observer.failures()[0].1, "boom");
        assert!(observer.outbound().is_empty());
    }
}
