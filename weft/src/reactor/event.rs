use std::os::fd::RawFd;

/// A readiness notification reported by the poller.
///
/// The poller does not interpret it further: the reactor invokes the
/// registration's callback on any event, including errors and hang-ups,
/// and the callback finds out what happened by trying the operation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Event {
    /// Token the descriptor was registered with.
    pub(crate) token: u64,

    pub(crate) readable: bool,
    pub(crate) writable: bool,
}

impl Event {
    /// The descriptor encoded in the low half of the token.
    pub(crate) fn fd(&self) -> RawFd {
        self.token as u32 as RawFd
    }
}

/// Builds a registration token from a descriptor and a generation.
///
/// The generation distinguishes a descriptor that was closed and reused
/// within one batch of events from the registration the events belong to.
pub(crate) fn token(fd: RawFd, generation: u32) -> u64 {
    ((generation as u64) << 32) | (fd as u32 as u64)
}
