use super::builder::{Config, ReactorBuilder};
use super::event::{self, Event};
use super::io::{Callback, Registration};
use super::poller::{Interest, Poller, Waker};
use crate::log::LogSink;
use crate::runtime::context;
use crate::runtime::scheduler::Scheduler;
use crate::runtime::task::{TaskId, Unit};
use crate::time::sleep;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Readiness multiplexer bound to one scheduler.
///
/// `Reactor` is a cheap, single-threaded handle; clones share the same
/// poller and interest list. Use [`handle`](Self::handle) to get a
/// thread-safe handle able to interrupt or stop it.
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<Inner>,
}

struct Inner {
    scheduler: Scheduler,
    config: Config,

    poller: RefCell<Poller>,
    registrations: RefCell<HashMap<RawFd, Registration>>,
    generation: Cell<u32>,

    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

/// Thread-safe handle to a reactor.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = reactor.handle();
///
/// std::thread::spawn(move || {
///     // ... talk to the server ...
///     handle.shutdown();
/// });
///
/// scheduler.run_forever();
/// ```
#[derive(Clone, Debug)]
pub struct ReactorHandle {
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

impl ReactorHandle {
    /// Interrupts the current (or next) readiness wait.
    pub fn wake(&self) {
        self.waker.wake();
    }

    /// Stops the polling task after its current wait.
    ///
    /// Every registration is dropped, closing the sockets it owns. Tasks
    /// still waiting on those sockets never resume.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.waker.wake();
    }
}

impl Reactor {
    /// Creates a reactor with the default configuration.
    pub fn new(scheduler: &Scheduler) -> io::Result<Self> {
        ReactorBuilder::new().build(scheduler)
    }

    /// Returns a builder to configure a reactor.
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder::new()
    }

    pub(crate) fn with_config(scheduler: &Scheduler, config: Config) -> io::Result<Self> {
        let poller = Poller::new(config.event_capacity)?;
        let waker = poller.waker();

        Ok(Self {
            inner: Rc::new(Inner {
                scheduler: scheduler.clone(),
                config,
                poller: RefCell::new(poller),
                registrations: RefCell::new(HashMap::new()),
                generation: Cell::new(0),
                waker,
                shutdown: Arc::new(AtomicBool::new(false)),
            }),
        })
    }

    /// Returns a `Send + Sync` handle to wake or stop this reactor.
    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            waker: self.inner.waker.clone(),
            shutdown: self.inner.shutdown.clone(),
        }
    }

    /// Returns the scheduler this reactor feeds.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub(crate) fn sink(&self) -> Rc<dyn LogSink> {
        self.inner.scheduler.sink()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registers `fd` for `interest`; `callback` runs on every readiness
    /// event for it.
    ///
    /// Registering a descriptor that is already registered replaces both
    /// its interest and its callback. This is safe from inside that
    /// descriptor's own callback.
    pub fn register(&self, fd: RawFd, interest: Interest, callback: Callback) -> io::Result<()> {
        let generation = self.inner.generation.get().wrapping_add(1);
        self.inner.generation.set(generation);

        let token = event::token(fd, generation);

        let previous = {
            let mut registrations = self.inner.registrations.borrow_mut();
            let poller = self.inner.poller.borrow();

            if registrations.contains_key(&fd) {
                poller.reregister(fd, token, interest)?;
            } else {
                poller.register(fd, token, interest)?;
            }

            registrations.insert(
                fd,
                Registration {
                    token,
                    interest,
                    callback,
                },
            )
        };

        tracing::trace!(fd, ?interest, "descriptor registered");

        drop(previous);
        Ok(())
    }

    /// Removes `fd` from the interest list and drops its callback.
    ///
    /// Returns `false` if the descriptor was not registered.
    pub fn unregister(&self, fd: RawFd) -> bool {
        let removed = self.inner.registrations.borrow_mut().remove(&fd);

        let Some(registration) = removed else {
            return false;
        };

        if let Err(err) = self.inner.poller.borrow().deregister(fd) {
            tracing::debug!(fd, error = %err, "failed to remove descriptor from poller");
        }

        tracing::trace!(fd, "descriptor unregistered");

        // Dropped last: the callback may own the descriptor itself.
        drop(registration);
        true
    }

    /// Returns `true` if `fd` is currently registered.
    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.inner.registrations.borrow().contains_key(&fd)
    }

    /// Returns the number of registered descriptors.
    pub fn registered_count(&self) -> usize {
        self.inner.registrations.borrow().len()
    }

    /// Returns the perpetual polling task.
    ///
    /// Each iteration blocks the thread on the readiness wait, runs the
    /// callback of every ready descriptor, then performs a zero-length
    /// timed wait so the scheduler can run whatever the callbacks made
    /// eligible.
    ///
    /// The wait has no timeout unless another live task is already
    /// eligible, in which case it only collects what is ready. This is what
    /// lets tasks registered by callbacks (the handling task of an accepted
    /// connection, say) run: they sit behind the polling task in the live
    /// set and would otherwise wait for the next unrelated readiness event.
    /// A task whose wake-at is still in the future is not considered and
    /// may be delayed until a descriptor becomes ready, unless the reactor
    /// was built with [`ReactorBuilder::wake_for_timers`].
    ///
    /// The task completes after [`ReactorHandle::shutdown`].
    pub fn poll_forever(&self) -> Unit<()> {
        let reactor = self.clone();

        Unit::new(async move {
            let mut events = Vec::with_capacity(reactor.inner.config.event_capacity);

            loop {
                if reactor.inner.shutdown.load(Ordering::Acquire) {
                    reactor.close_all();
                    return Ok(());
                }

                let timeout = reactor.wait_timeout(context::current_task());

                reactor.inner.poller.borrow_mut().poll(&mut events, timeout)?;

                for event in events.drain(..) {
                    reactor.dispatch(event);
                }

                sleep(Duration::ZERO).await;
            }
        })
    }

    /// Registers [`poll_forever`](Self::poll_forever) with the scheduler.
    pub fn spawn_poller(&self) -> TaskId {
        self.inner.scheduler.register(self.poll_forever())
    }

    fn wait_timeout(&self, poller_task: Option<TaskId>) -> Option<Duration> {
        let scheduler = &self.inner.scheduler;

        let Some(id) = poller_task else {
            return (scheduler.live_count() > 0).then_some(Duration::ZERO);
        };

        if scheduler.has_runnable_except(id) {
            return Some(Duration::ZERO);
        }

        if !self.inner.config.wake_for_timers {
            return None;
        }

        scheduler
            .next_wake_except(id)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn dispatch(&self, event: Event) {
        let fd = event.fd();

        let callback = {
            let registrations = self.inner.registrations.borrow();

            match registrations.get(&fd) {
                Some(registration) if registration.token == event.token => {
                    registration.callback.clone()
                }
                _ => return,
            }
        };

        tracing::trace!(
            fd,
            readable = event.readable,
            writable = event.writable,
            "descriptor ready"
        );

        callback(self, fd);
    }

    fn close_all(&self) {
        let registrations: Vec<_> = self.inner.registrations.borrow_mut().drain().collect();

        {
            let poller = self.inner.poller.borrow();

            for (fd, _) in &registrations {
                let _ = poller.deregister(*fd);
            }
        }

        tracing::debug!(count = registrations.len(), "reactor shut down");

        drop(registrations);
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("registered", &self.inner.registrations.borrow().len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
