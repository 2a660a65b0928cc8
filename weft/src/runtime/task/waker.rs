use std::ptr;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Vtable for wakers handed to task bodies.
///
/// Tasks are resumed only when the scheduler interprets their suspension
/// request, never through a waker, so every entry is inert.
static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, noop_raw, noop_raw, noop_raw);

/// Creates the waker used while polling a task body.
pub(crate) fn inert_waker() -> Waker {
    unsafe { Waker::from_raw(RawWaker::new(ptr::null(), &VTABLE)) }
}

fn clone_raw(_: *const ()) -> RawWaker {
    RawWaker::new(ptr::null(), &VTABLE)
}

fn noop_raw(_: *const ()) {}
