use super::core::Reactor;
use crate::runtime::scheduler::Scheduler;

use std::io;

/// Tunables shared by the reactor and its transport callbacks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Config {
    pub(crate) read_buffer_size: usize,
    pub(crate) backlog: i32,
    pub(crate) event_capacity: usize,
    pub(crate) wake_for_timers: bool,
}

/// Builder for configuring and creating a reactor.
///
/// # Examples
///
/// ```rust,ignore
/// let reactor = ReactorBuilder::new()
///     .read_buffer_size(4096)
///     .build(&scheduler)?;
/// ```
#[derive(Debug)]
pub struct ReactorBuilder {
    config: Config,
}

impl ReactorBuilder {
    /// Creates a builder with the default configuration: 1024-byte reads,
    /// a listen backlog of 128, up to 64 events per wait and a readiness
    /// wait that ignores timed waits.
    pub fn new() -> Self {
        Self {
            config: Config {
                read_buffer_size: 1024,
                backlog: 128,
                event_capacity: 64,
                wake_for_timers: false,
            },
        }
    }

    /// Sets how many bytes a single receive reads, for inbound requests and
    /// outbound responses alike.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn read_buffer_size(mut self, n: usize) -> Self {
        assert!(n > 0, "read_buffer_size must be > 0");

        self.config.read_buffer_size = n;
        self
    }

    /// Sets the listen backlog of servers started on this reactor.
    pub fn backlog(mut self, n: u32) -> Self {
        self.config.backlog = n.min(i32::MAX as u32) as i32;
        self
    }

    /// Sets how many readiness events one wait can report.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn event_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "event_capacity must be > 0");

        self.config.event_capacity = n;
        self
    }

    /// Bounds the readiness wait by the earliest pending timed wait.
    ///
    /// Off by default: the wait then blocks until a descriptor becomes
    /// ready, and a task whose wake-at passes in the meantime is only
    /// resumed afterwards.
    pub fn wake_for_timers(mut self, enabled: bool) -> Self {
        self.config.wake_for_timers = enabled;
        self
    }

    /// Creates the poller and binds the reactor to `scheduler`.
    pub fn build(self, scheduler: &Scheduler) -> io::Result<Reactor> {
        Reactor::with_config(scheduler, self.config)
    }
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
