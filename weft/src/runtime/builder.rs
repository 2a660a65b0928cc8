use super::scheduler::Scheduler;
use crate::log::{LogSink, TracingSink};

use std::rc::Rc;

/// Builder for configuring and creating a scheduler.
///
/// The only knob is where externally observable log events go. By default
/// they are forwarded to `tracing`.
///
/// # Examples
///
/// ```rust,ignore
/// let sink = MemorySink::new();
/// let scheduler = SchedulerBuilder::new()
///     .sink(Rc::new(sink.clone()))
///     .build();
/// ```
pub struct SchedulerBuilder {
    sink: Rc<dyn LogSink>,
}

impl SchedulerBuilder {
    /// Creates a builder reporting through [`TracingSink`].
    pub fn new() -> Self {
        Self {
            sink: Rc::new(TracingSink),
        }
    }

    /// Sets the sink receiving unhandled task errors and request log lines.
    pub fn sink(mut self, sink: Rc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Builds the scheduler with an empty live set.
    pub fn build(self) -> Scheduler {
        Scheduler::with_sink(self.sink)
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
