use weft::{Bridge, BridgeError, Scheduler, TaskError, Unit};

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

type Slot<T> = Rc<RefCell<Option<Result<T, TaskError>>>>;

fn waiter(scheduler: &Scheduler, bridge: Bridge<u32>) -> (weft::TaskId, Slot<u32>) {
    let slot: Slot<u32> = Rc::new(RefCell::new(None));
    let out = slot.clone();

    let id = scheduler.register(Unit::new(async move {
        *out.borrow_mut() = Some(bridge.await);
        Ok(())
    }));

    (id, slot)
}

#[test]
fn test_resolution_after_attach_resumes_task() {
    let scheduler = Scheduler::new();
    let bridge = Bridge::new();
    let (id, slot) = waiter(&scheduler, bridge.clone());

    assert!(scheduler.tick());
    assert!(bridge.is_armed());
    assert!(!scheduler.is_live(id));
    assert!(!scheduler.tick(), "a detached task is not live");

    bridge.resolve(9).unwrap();

    assert!(bridge.is_resolved());
    assert!(scheduler.is_live(id));

    scheduler.run_forever();

    assert_eq!(slot.borrow_mut().take().unwrap().unwrap(), 9);
}

#[test]
fn test_resolution_before_attach_is_queued() {
    let scheduler = Scheduler::new();
    let bridge = Bridge::new();

    bridge.resolve(3).unwrap();
    assert!(bridge.is_resolved());
    assert!(!bridge.is_armed());

    let (_, slot) = waiter(&scheduler, bridge);
    scheduler.run_forever();

    assert_eq!(slot.borrow_mut().take().unwrap().unwrap(), 3);
}

#[test]
fn test_error_outcome_is_raised_at_await() {
    let scheduler = Scheduler::new();
    let bridge = Bridge::new();
    let (_, slot) = waiter(&scheduler, bridge.clone());

    scheduler.tick();
    bridge
        .resolve_with_error(io::Error::from(io::ErrorKind::ConnectionRefused))
        .unwrap();
    scheduler.run_forever();

    let err = slot.borrow_mut().take().unwrap().unwrap_err();
    assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionRefused));
}

#[test]
fn test_second_attach_is_rejected_deterministically() {
    let scheduler = Scheduler::new();
    let bridge = Bridge::new();

    let (_, first) = waiter(&scheduler, bridge.clone());
    let (_, second) = waiter(&scheduler, bridge.clone());

    scheduler.run_forever();

    assert!(matches!(
        second.borrow_mut().take(),
        Some(Err(TaskError::Bridge(BridgeError::AlreadyAttached)))
    ));
    assert!(first.borrow().is_none());

    bridge.resolve(5).unwrap();
    scheduler.run_forever();

    assert_eq!(first.borrow_mut().take().unwrap().unwrap(), 5);
}

#[test]
fn test_attach_after_delivery_is_rejected() {
    let scheduler = Scheduler::new();
    let bridge = Bridge::new();

    let (_, first) = waiter(&scheduler, bridge.clone());
    scheduler.tick();
    bridge.resolve(8).unwrap();
    scheduler.run_forever();

    assert_eq!(first.borrow_mut().take().unwrap().unwrap(), 8);
    assert!(bridge.is_resolved());

    let (_, late) = waiter(&scheduler, bridge.clone());
    scheduler.run_forever();

    assert!(matches!(
        late.borrow_mut().take(),
        Some(Err(TaskError::Bridge(BridgeError::AlreadyResolved)))
    ));
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "bridge resolved twice"))]
fn test_double_resolution_is_a_defect() {
    let scheduler = Scheduler::new();
    let bridge = Bridge::new();

    bridge.resolve(1).unwrap();
    assert_eq!(bridge.resolve(2), Err(BridgeError::AlreadyResolved));

    let (_, slot) = waiter(&scheduler, bridge);
    scheduler.run_forever();

    assert_eq!(slot.borrow_mut().take().unwrap().unwrap(), 1, "first outcome wins");
}
