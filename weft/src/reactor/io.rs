use super::core::Reactor;
use super::poller::Interest;

use std::fmt;
use std::os::fd::RawFd;
use std::rc::Rc;

/// Invoked synchronously, from inside the polling task, when the
/// registered descriptor reports readiness.
///
/// The callback receives the reactor so it can change or drop its own
/// registration, register new descriptors, or admit tasks.
pub type Callback = Rc<dyn Fn(&Reactor, RawFd)>;

/// One descriptor in the reactor's interest list.
///
/// Whatever the callback captures (typically the socket itself) lives as
/// long as the registration does.
pub(crate) struct Registration {
    pub(crate) token: u64,
    pub(crate) interest: Interest,
    pub(crate) callback: Callback,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("token", &self.token)
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}
