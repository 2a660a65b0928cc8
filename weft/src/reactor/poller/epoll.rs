//! Linux `epoll`-based poller.
//!
//! Responsibilities:
//! - register descriptors with a single read or write interest,
//! - block waiting for readiness, optionally with a timeout,
//! - wake up early when the `eventfd` waker is signalled.

use super::common::{Interest, Waker};
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// Reserved token of the wake-up `eventfd`.
///
/// Registration tokens carry the descriptor in their low 32 bits and can
/// never be all ones.
const WAKE_TOKEN: u64 = u64::MAX;

/// Linux `epoll` poller.
///
/// Owns the epoll instance, the reusable event buffer and the waker that
/// lets other threads interrupt `epoll_wait`.
pub(crate) struct EpollPoller {
    epoll: RawFd,
    events: Vec<epoll_event>,
    waker: Arc<Waker>,
}

impl EpollPoller {
    /// Creates the epoll instance and registers a non-blocking `eventfd` as
    /// its persistent wake source.
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        let eventfd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if eventfd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(epoll) };
            return Err(err);
        }

        let waker = Arc::new(Waker(eventfd));

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };

        if unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, eventfd, &mut event) } < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(epoll) };
            return Err(err);
        }

        let empty = epoll_event { events: 0, u64: 0 };

        Ok(Self {
            epoll,
            events: vec![empty; capacity.max(1)],
            waker,
        })
    }

    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    /// Adds a descriptor to the interest list.
    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.control(EPOLL_CTL_ADD, fd, token, interest)
    }

    /// Changes the interest and token of an already registered descriptor.
    pub(crate) fn reregister(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.control(EPOLL_CTL_MOD, fd, token, interest)
    }

    /// Removes a descriptor from the interest list.
    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let rc = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };

        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn control(
        &self,
        op: libc::c_int,
        fd: RawFd,
        token: u64,
        interest: Interest,
    ) -> io::Result<()> {
        let flags = match interest {
            Interest::Readable => EPOLLIN,
            Interest::Writable => EPOLLOUT,
        };

        let mut event = epoll_event {
            events: flags as u32,
            u64: token,
        };

        let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };

        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Waits for readiness events and appends them to `events`.
    ///
    /// Blocks until a descriptor is ready, the waker is signalled, or the
    /// timeout expires (`None` waits indefinitely). An interrupted wait
    /// returns without events.
    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<Event>,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        let timeout_ms = match timeout {
            // Rounded up so a short timeout does not turn into a busy loop.
            Some(timeout) => timeout.as_micros().div_ceil(1000).min(i32::MAX as u128) as i32,
            None => -1,
        };

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.len() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        for ev in &self.events[..n as usize] {
            let token = ev.u64;

            if token == WAKE_TOKEN {
                self.waker.drain();
                continue;
            }

            let flags = ev.events;

            events.push(Event {
                token,
                readable: flags & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0,
                writable: flags & ((EPOLLOUT | EPOLLERR) as u32) != 0,
            });
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll);
        }
    }
}
