use std::os::fd::RawFd;

/// Readiness a registration waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Data can be read, or a connection can be accepted.
    Readable,

    /// Data can be written, or a pending connect finished.
    Writable,
}

/// Owner of the `eventfd` used to interrupt a blocking wait.
///
/// The descriptor is closed when the last owner drops it, so a
/// [`ReactorHandle`](crate::ReactorHandle) outliving its reactor never
/// writes to a recycled descriptor.
#[derive(Debug)]
pub(crate) struct Waker(pub(crate) RawFd);

impl Waker {
    /// Makes the current or next readiness wait return immediately.
    pub(crate) fn wake(&self) {
        let buf: u64 = 1;

        // A full counter (EAGAIN) already guarantees a wakeup.
        unsafe {
            libc::write(self.0, &buf as *const u64 as *const _, 8);
        }
    }

    /// Resets the counter after a wakeup has been observed.
    pub(crate) fn drain(&self) {
        let mut buf = 0u64;

        unsafe {
            libc::read(self.0, &mut buf as *mut u64 as *mut _, 8);
        }
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}
