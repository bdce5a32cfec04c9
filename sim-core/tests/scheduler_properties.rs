//! Queue ordering and timing properties, exercised through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use sim_core::{
    attach_unit, detach_unit, Activation, MemoryMediaStore, Scheduler, SimResult, Unit, UnitId,
};

type FireLog = Rc<RefCell<Vec<String>>>;

fn logging_unit(sched: &mut Scheduler, log: &FireLog, name: &str) -> UnitId {
    let log = Rc::clone(log);
    sched.add_unit(Unit::new(name).with_action(move |sched, id| {
        log.borrow_mut().push(sched.unit(id).name().to_string());
        Ok(())
    }))
}

fn run_ticks(sched: &mut Scheduler, ticks: usize) -> SimResult<()> {
    for _ in 0..ticks {
        sched.tick()?;
    }
    Ok(())
}

#[test]
fn activation_time_is_one_past_delay() {
    let mut sched = Scheduler::default();
    let log = FireLog::default();
    let delays = [7, 0, 12, 3, 3, 250];

    let units: Vec<_> = delays
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let unit = logging_unit(&mut sched, &log, &format!("U{i}"));
            assert_eq!(sched.activate(unit, t), Activation::Queued);
            unit
        })
        .collect();

    for (&unit, &t) in units.iter().zip(&delays) {
        assert_eq!(sched.activation_time(unit), t + 1);
    }
    assert_eq!(sched.queue_len(), delays.len());
}

#[test]
fn activation_time_tracks_consumed_ticks() {
    let mut sched = Scheduler::default();
    let log = FireLog::default();
    let a = logging_unit(&mut sched, &log, "A");
    let b = logging_unit(&mut sched, &log, "B");

    sched.activate(a, 20);
    run_ticks(&mut sched, 8).unwrap();
    sched.activate(b, 5);

    assert_eq!(sched.activation_time(a), 13);
    assert_eq!(sched.activation_time(b), 6);
}

#[test]
fn activate_and_cancel_are_idempotent() {
    let mut sched = Scheduler::default();
    let log = FireLog::default();
    let unit = logging_unit(&mut sched, &log, "U");

    sched.cancel(unit).unwrap();
    assert!(!sched.is_active(unit));

    sched.activate(unit, 9);
    assert_eq!(sched.activate(unit, 2), Activation::AlreadyActive);
    assert!(sched.is_active(unit));
    assert_eq!(sched.activation_time(unit), 10);
}

#[test]
fn ties_fire_in_call_order() {
    let mut sched = Scheduler::default();
    let log = FireLog::default();

    for (name, t) in [("five", 5), ("three-a", 3), ("three-b", 3), ("ten", 10)] {
        let unit = logging_unit(&mut sched, &log, name);
        sched.activate(unit, t);
    }
    run_ticks(&mut sched, 11).unwrap();

    assert_eq!(*log.borrow(), vec!["three-a", "three-b", "five", "ten"]);
    assert_eq!(sched.queue_len(), 0);
}

#[test]
fn cancel_then_reactivate_matches_fresh_activation() {
    let mut sched = Scheduler::default();
    let log = FireLog::default();
    let unit = logging_unit(&mut sched, &log, "U");

    sched.activate(unit, 5);
    let fresh = sched.activation_time(unit);
    sched.cancel(unit).unwrap();
    sched.activate(unit, 5);

    assert_eq!(sched.activation_time(unit), fresh);
    assert_eq!(fresh, 6);
}

#[test]
fn zero_delay_is_due_on_next_dispatch() {
    let mut sched = Scheduler::default();
    let log = FireLog::default();
    let unit = logging_unit(&mut sched, &log, "U");
    let later = logging_unit(&mut sched, &log, "later");

    sched.activate(later, 100);
    run_ticks(&mut sched, 30).unwrap();
    sched.activate(unit, 0);
    assert_eq!(sched.interval(), 0);

    sched.process_event().unwrap();
    assert_eq!(*log.borrow(), vec!["U"]);
    assert!(sched.is_active(later));
}

#[test]
fn drain_leaves_later_unit_queued() {
    let mut sched = Scheduler::default();
    let log = FireLog::default();
    let a = logging_unit(&mut sched, &log, "A");
    let b = logging_unit(&mut sched, &log, "B");
    let c = logging_unit(&mut sched, &log, "C");

    sched.activate(a, 10);
    sched.activate(b, 4);
    sched.activate(c, 4);

    // Ticks 0 through 4.
    run_ticks(&mut sched, 5).unwrap();

    assert_eq!(*log.borrow(), vec!["B", "C"]);
    assert!(sched.is_active(a));
    assert!(!sched.is_active(b) && !sched.is_active(c));
    assert_eq!(sched.activation_time(a), 6);
    assert_eq!(sched.queued_units(), vec![a]);
}

#[test]
fn buffered_attach_detach_without_writes_does_not_flush() {
    let mut store = MemoryMediaStore::with_images([("test.img", vec![0x5A; 64])]);
    let mut unit = Unit::new("DK0").attachable().buffered().with_capacity(64);

    attach_unit(&mut unit, &mut store, "test.img").unwrap();
    assert!(unit.is_buffered());
    assert!(!unit.is_dirty());

    detach_unit(&mut unit).unwrap();

    assert_eq!(store.write_count("test.img"), 0);
    assert!(!unit.is_attached());
    assert!(!unit.is_buffered());
}
