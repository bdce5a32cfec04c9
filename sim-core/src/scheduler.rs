//! Event queue and dispatcher.
//!
//! Pending units form a singly linked delta queue: each queued unit stores the
//! ticks between itself and the entry before it, so the absolute deadline of a
//! unit is the sum of offsets from the head. `interval` counts down the ticks
//! until the head fires; the instruction stream decrements it and calls
//! [`Scheduler::process_event`] once it reaches zero.
//!
//! Ticks consumed from `interval` are folded into simulated time lazily,
//! before every queue mutation, by writing the live `interval` back into the
//! head's offset.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error};

use crate::config::SchedulerConfig;
use crate::error::{SimError, SimResult};
use crate::unit::{QueueLink, Unit, UnitId};

/// Outcome of a successful activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Queued,
    /// The unit was already scheduled and keeps its old deadline.
    AlreadyActive,
}

/// Thread-safe handle that asks the dispatcher to stop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the request, returning whether one was pending.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// The simulation clock, its event queue and the units it schedules.
pub struct Scheduler {
    units: Vec<Unit>,
    head: QueueLink,
    interval: i32,
    noqueue_time: i32,
    noqueue_wait: i32,
    time: f64,
    rtime: u32,
    instructions_per_second: f64,
    processing_event: bool,
    stop: StopHandle,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            units: Vec::new(),
            head: QueueLink::End,
            interval: 0,
            noqueue_time: 0,
            noqueue_wait: config.noqueue_wait,
            time: 0.0,
            rtime: 0,
            instructions_per_second: config.instructions_per_second,
            processing_event: false,
            stop: StopHandle::default(),
        }
    }

    // ==================== Units ====================

    /// Take ownership of a unit for the rest of the scheduler's life.
    pub fn add_unit(&mut self, unit: Unit) -> UnitId {
        self.units.push(unit);
        UnitId(self.units.len() - 1)
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn unit_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.0]
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Replace a unit's action callback.
    pub fn set_action(
        &mut self,
        id: UnitId,
        action: impl FnMut(&mut Scheduler, UnitId) -> SimResult<()> + 'static,
    ) {
        self.units[id.0].action = Some(Box::new(action));
    }

    /// Replace a unit's cancel hook.
    pub fn set_cancel_hook(&mut self, id: UnitId, hook: impl FnMut(UnitId) -> bool + 'static) {
        self.units[id.0].cancel_hook = Some(Box::new(hook));
    }

    // ==================== Clock ====================

    /// Ticks until the head of the queue fires.
    pub fn interval(&self) -> i32 {
        self.interval
    }

    /// Account for ticks spent by the instruction stream.
    pub fn consume(&mut self, ticks: i32) {
        self.interval = self.interval.wrapping_sub(ticks);
    }

    /// Run one instruction slot with no instruction in it: process due events,
    /// then spend a tick.
    pub fn tick(&mut self) -> SimResult<()> {
        if self.interval <= 0 {
            self.process_event()?;
        }
        self.consume(1);
        Ok(())
    }

    /// Simulated time in ticks.
    pub fn elapsed(&self) -> f64 {
        self.time + self.unaccounted_ticks() as f64
    }

    /// Simulated time in ticks, modulo 2^32.
    pub fn elapsed_wrapping(&self) -> u32 {
        self.rtime.wrapping_add(self.unaccounted_ticks() as u32)
    }

    pub fn instructions_per_second(&self) -> f64 {
        self.instructions_per_second
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the dispatcher to stop at its next opportunity.
    pub fn request_stop(&self) {
        self.stop.request();
    }

    /// True while `process_event` is invoking callbacks.
    pub fn is_processing_event(&self) -> bool {
        self.processing_event
    }

    fn reference_time(&self) -> i32 {
        match self.head {
            QueueLink::End => self.noqueue_time,
            QueueLink::Next(id) => self.units[id.0].time,
        }
    }

    fn unaccounted_ticks(&self) -> i32 {
        self.reference_time().wrapping_sub(self.interval)
    }

    fn update_time(&mut self) {
        let consumed = self.unaccounted_ticks();
        self.time += consumed as f64;
        self.rtime = self.rtime.wrapping_add(consumed as u32);
        match self.head {
            QueueLink::End => self.noqueue_time = self.interval,
            QueueLink::Next(id) => self.units[id.0].time = self.interval,
        }
    }

    fn reset_interval(&mut self) {
        match self.head {
            QueueLink::End => {
                self.interval = self.noqueue_wait;
                self.noqueue_time = self.noqueue_wait;
            }
            QueueLink::Next(id) => self.interval = self.units[id.0].time,
        }
    }

    fn usecs_to_ticks(&self, usecs: f64) -> f64 {
        usecs * self.instructions_per_second / 1_000_000.0
    }

    // ==================== Queue ====================

    pub fn is_active(&self, id: UnitId) -> bool {
        self.units[id.0].next.is_some()
    }

    /// Schedule a unit `ticks` from now. A unit that is already scheduled
    /// keeps its current deadline.
    pub fn activate(&mut self, id: UnitId, ticks: i32) -> Activation {
        if self.is_active(id) {
            return Activation::AlreadyActive;
        }
        self.update_time();
        let ticks = ticks.max(0);
        debug!("Activating {} delay={}", self.units[id.0].name, ticks);

        let mut prev = None;
        let mut accum = 0i32;
        let mut cursor = self.head;
        while let QueueLink::Next(cur) = cursor {
            let offset = self.units[cur.0].time;
            if ticks < accum.saturating_add(offset) {
                break;
            }
            accum = accum.saturating_add(offset);
            prev = Some(cur);
            cursor = self.link_of(cur);
        }

        match prev {
            None => self.head = QueueLink::Next(id),
            Some(p) => self.units[p.0].next = Some(QueueLink::Next(id)),
        }
        let offset = ticks - accum;
        self.units[id.0].next = Some(cursor);
        self.units[id.0].time = offset;
        if let QueueLink::Next(following) = cursor {
            self.units[following.0].time -= offset;
        }
        self.reset_interval();
        Activation::Queued
    }

    /// Schedule a unit `ticks` from now, replacing any pending activation.
    pub fn activate_abs(&mut self, id: UnitId, ticks: i32) -> SimResult<Activation> {
        self.cancel(id)?;
        Ok(self.activate(id, ticks))
    }

    /// Schedule a unit at absolute tick `not_before` (modulo 2^32), or right
    /// away if that time has already passed.
    pub fn activate_not_before(&mut self, id: UnitId, not_before: u32) -> SimResult<Activation> {
        self.cancel(id)?;
        let delta = not_before.wrapping_sub(self.elapsed_wrapping());
        if delta >= 0x8000_0000 {
            return Ok(self.activate(id, 0));
        }
        self.activate_abs(id, delta as i32)
    }

    /// Schedule a unit after `usecs` of wall-clock time at the configured tick
    /// rate. Delays longer than one tick interval can express keep the excess
    /// in the unit's pending delay; the dispatcher re-arms it when the first
    /// leg expires.
    pub fn activate_after(&mut self, id: UnitId, usecs: f64) -> Activation {
        if self.is_active(id) {
            return Activation::AlreadyActive;
        }
        let usecs = usecs.max(0.0);
        let ticks = self.usecs_to_ticks(usecs);
        let (ticks, remaining) = if ticks > i32::MAX as f64 {
            let covered = i32::MAX as f64 * 1_000_000.0 / self.instructions_per_second;
            (i32::MAX, usecs - covered)
        } else {
            (ticks as i32, 0.0)
        };
        let activation = self.activate(id, ticks);
        self.units[id.0].pending_async_delay = remaining;
        activation
    }

    /// As [`activate_after`](Self::activate_after), replacing any pending activation.
    pub fn activate_after_abs(&mut self, id: UnitId, usecs: f64) -> SimResult<Activation> {
        self.cancel(id)?;
        Ok(self.activate_after(id, usecs))
    }

    /// Remove a unit from the queue. Cancelling an idle unit is a no-op.
    ///
    /// A unit still linked after removal means the queue is corrupt; the
    /// process is aborted rather than left running on it.
    pub fn cancel(&mut self, id: UnitId) -> SimResult<()> {
        if let Some(hook) = self.units[id.0].cancel_hook.as_mut() {
            if hook(id) {
                return Ok(());
            }
        }
        if !self.is_active(id) {
            return Ok(());
        }
        self.update_time();
        debug!("Canceling event for {}", self.units[id.0].name);

        let successor = self.link_of(id);
        if self.head == QueueLink::Next(id) {
            self.head = successor;
            self.units[id.0].next = None;
        } else {
            let mut cursor = self.head;
            while let QueueLink::Next(cur) = cursor {
                let next = self.link_of(cur);
                if next == QueueLink::Next(id) {
                    self.units[cur.0].next = Some(successor);
                    self.units[id.0].next = None;
                    break;
                }
                cursor = next;
            }
        }

        if self.units[id.0].next.is_none() {
            if let QueueLink::Next(following) = successor {
                self.units[following.0].time += self.units[id.0].time;
            }
            self.units[id.0].time = 0;
        }
        self.units[id.0].pending_async_delay = 0.0;
        self.reset_interval();

        if self.units[id.0].next.is_some() {
            self.queue_corrupted(id, "cancel failed");
        }
        Ok(())
    }

    /// One plus the ticks until a unit fires, or 0 if it is idle.
    pub fn activation_time(&self, id: UnitId) -> i32 {
        match self.queue_time(id) {
            0 => 0,
            accum => {
                let pending = self.usecs_to_ticks(self.units[id.0].pending_async_delay);
                accum.saturating_add(pending as i32)
            }
        }
    }

    /// One plus the wall-clock microseconds until a unit fires, or 0 if it is idle.
    pub fn activation_time_usecs(&self, id: UnitId) -> f64 {
        match self.queue_time(id) {
            0 => 0.0,
            accum => {
                let ticks = (accum - 1) as f64;
                1.0 + self.units[id.0].pending_async_delay
                    + ticks * 1_000_000.0 / self.instructions_per_second
            }
        }
    }

    fn queue_time(&self, id: UnitId) -> i32 {
        let mut accum = 0i32;
        let mut cursor = self.head;
        while let QueueLink::Next(cur) = cursor {
            if cursor == self.head {
                if self.interval > 0 {
                    accum = accum.saturating_add(self.interval);
                }
            } else {
                accum = accum.saturating_add(self.units[cur.0].time);
            }
            if cur == id {
                return accum.saturating_add(1);
            }
            cursor = self.link_of(cur);
        }
        0
    }

    /// Number of queued units.
    pub fn queue_len(&self) -> usize {
        self.queued_units().len()
    }

    /// Queued units in firing order.
    pub fn queued_units(&self) -> Vec<UnitId> {
        let mut units = Vec::new();
        let mut cursor = self.head;
        while let QueueLink::Next(cur) = cursor {
            units.push(cur);
            cursor = self.link_of(cur);
        }
        units
    }

    fn link_of(&self, id: UnitId) -> QueueLink {
        match self.units[id.0].next {
            Some(link) => link,
            None => self.queue_corrupted(id, "queued unit has no link"),
        }
    }

    fn queue_corrupted(&self, id: UnitId, what: &str) -> ! {
        error!(
            "Event queue corrupted: {} for {}; aborting",
            what, self.units[id.0].name
        );
        std::process::abort()
    }

    // ==================== Dispatch ====================

    /// Fire every unit that is due.
    ///
    /// Called when `interval` reaches zero. Units due in the same tick fire in
    /// queue order until one returns a non-OK status, the queue empties, the
    /// next unit lies in the future, or a stop is requested.
    pub fn process_event(&mut self) -> SimResult<()> {
        if self.stop.take() {
            return Err(SimError::Stopped);
        }
        self.update_time();

        if self.head == QueueLink::End {
            self.reset_interval();
            debug!("Queue empty, new interval = {}", self.interval);
            return Ok(());
        }

        self.processing_event = true;
        let mut result = Ok(());
        while let QueueLink::Next(id) = self.head {
            let next = self.link_of(id);
            self.head = next;
            self.units[id.0].next = None;
            self.interval -= self.units[id.0].time;
            self.units[id.0].time = 0;
            match next {
                QueueLink::Next(following) => self.interval += self.units[following.0].time,
                QueueLink::End => self.reset_interval(),
            }

            result = self.fire(id);
            if let Err(err) = &result {
                if !err.is_expected_stop() {
                    error!(
                        "Unexpected internal error while processing event for {} which returned {} - {}",
                        self.units[id.0].name,
                        err.code(),
                        err
                    );
                }
            }

            let keep_going = result.is_ok()
                && self.interval <= 0
                && self.head != QueueLink::End
                && !self.stop.is_requested();
            if !keep_going {
                break;
            }
        }

        match self.head {
            QueueLink::End => {
                self.reset_interval();
                debug!("Processing queue complete, new interval = {}", self.interval);
            }
            QueueLink::Next(id) => debug!(
                "Processing queue complete, new interval = {} ({})",
                self.interval, self.units[id.0].name
            ),
        }

        if result.is_ok() && self.stop.take() {
            result = Err(SimError::Stopped);
        }
        self.processing_event = false;
        result
    }

    fn fire(&mut self, id: UnitId) -> SimResult<()> {
        let delay = self.units[id.0].pending_async_delay;
        if delay > 0.0 {
            debug!("Requeueing {} after {:.0} usecs", self.units[id.0].name, delay);
            self.units[id.0].pending_async_delay = 0.0;
            self.activate_after(id, delay);
            return Ok(());
        }

        if let Some(completion) = self.units[id.0].completion.take() {
            debug!("Completing I/O for {}", self.units[id.0].name);
            return completion.deliver(self, id);
        }

        debug!("Processing event for {}", self.units[id.0].name);
        let Some(mut action) = self.units[id.0].action.take() else {
            return Ok(());
        };
        let result = action(self, id);
        // The callback may have installed a replacement.
        let slot = &mut self.units[id.0].action;
        if slot.is_none() {
            *slot = Some(action);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn recording_unit(sched: &mut Scheduler, log: &Log, name: &'static str) -> UnitId {
        let log = Rc::clone(log);
        sched.add_unit(Unit::new(name).with_action(move |_, _| {
            log.borrow_mut().push(name);
            Ok(())
        }))
    }

    fn run_ticks(sched: &mut Scheduler, ticks: usize) {
        for _ in 0..ticks {
            sched.tick().unwrap();
        }
    }

    #[test]
    fn test_activation_time_counts_from_now() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");
        let b = recording_unit(&mut sched, &log, "B");

        sched.activate(a, 7);
        sched.activate(b, 3);

        assert_eq!(sched.activation_time(a), 8);
        assert_eq!(sched.activation_time(b), 4);
        assert_eq!(sched.interval(), 3);
    }

    #[test]
    fn test_activate_twice_keeps_first_deadline() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        assert_eq!(sched.activate(a, 5), Activation::Queued);
        assert_eq!(sched.activate(a, 50), Activation::AlreadyActive);
        assert_eq!(sched.activation_time(a), 6);
        assert_eq!(sched.queue_len(), 1);
    }

    #[test]
    fn test_cancel_idle_unit_is_noop() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        sched.cancel(a).unwrap();
        assert!(!sched.is_active(a));
        assert_eq!(sched.activation_time(a), 0);
    }

    #[test]
    fn test_cancel_folds_offset_into_successor() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");
        let b = recording_unit(&mut sched, &log, "B");
        let c = recording_unit(&mut sched, &log, "C");

        sched.activate(a, 2);
        sched.activate(b, 5);
        sched.activate(c, 9);
        sched.cancel(b).unwrap();

        assert_eq!(sched.queued_units(), vec![a, c]);
        assert_eq!(sched.activation_time(c), 10);

        sched.cancel(a).unwrap();
        assert_eq!(sched.interval(), 9);
        assert_eq!(sched.activation_time(c), 10);
    }

    #[test]
    fn test_activate_abs_reschedules() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        sched.activate(a, 50);
        assert_eq!(sched.activate_abs(a, 5).unwrap(), Activation::Queued);
        assert_eq!(sched.activation_time(a), 6);
    }

    #[test]
    fn test_activate_not_before() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");
        let b = recording_unit(&mut sched, &log, "B");

        run_ticks(&mut sched, 10);
        let now = sched.elapsed_wrapping();

        sched.activate_not_before(a, now + 20).unwrap();
        assert_eq!(sched.activation_time(a), 21);

        // Already in the past: fires right away.
        sched.activate_not_before(b, now - 5).unwrap();
        assert_eq!(sched.activation_time(b), 1);
    }

    #[test]
    fn test_cancel_hook_intercepts() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");
        let swallowed = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&swallowed);
        sched.set_cancel_hook(a, move |_| {
            *counter.borrow_mut() += 1;
            true
        });

        sched.activate(a, 4);
        sched.cancel(a).unwrap();

        assert!(sched.is_active(a));
        assert_eq!(*swallowed.borrow(), 1);
    }

    #[test]
    fn test_empty_queue_reports_noqueue_wait() {
        let config = SchedulerConfig {
            noqueue_wait: 500,
            ..SchedulerConfig::default()
        };
        let mut sched = Scheduler::new(&config);

        sched.process_event().unwrap();
        assert_eq!(sched.interval(), 500);
    }

    #[test]
    fn test_elapsed_tracks_consumed_ticks() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        sched.activate(a, 4);
        run_ticks(&mut sched, 4);
        assert_eq!(sched.elapsed(), 4.0);

        run_ticks(&mut sched, 3);
        assert_eq!(sched.elapsed(), 7.0);
        assert_eq!(sched.elapsed_wrapping(), 7);
        assert_eq!(*log.borrow(), vec!["A"]);
    }

    #[test]
    fn test_action_can_reactivate_itself() {
        let mut sched = Scheduler::default();
        let fired = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&fired);
        let unit = sched.add_unit(Unit::new("PER").with_action(move |sched, me| {
            *counter.borrow_mut() += 1;
            sched.activate(me, 10);
            Ok(())
        }));

        sched.activate(unit, 10);
        run_ticks(&mut sched, 41);

        assert_eq!(*fired.borrow(), 4);
        assert!(sched.is_active(unit));
    }

    #[test]
    fn test_action_can_cancel_other_units() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let victim = recording_unit(&mut sched, &log, "VICTIM");
        let killer = sched.add_unit(Unit::new("KILLER").with_action(move |sched, _| {
            sched.cancel(victim)
        }));

        sched.activate(killer, 2);
        sched.activate(victim, 2);
        run_ticks(&mut sched, 5);

        assert!(log.borrow().is_empty());
        assert!(!sched.is_active(victim));
    }

    #[test]
    fn test_error_status_stops_the_drain() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let bad = sched.add_unit(
            Unit::new("BAD").with_action(|_, _| Err(SimError::InternalError("boom".into()))),
        );
        let after = recording_unit(&mut sched, &log, "AFTER");

        sched.activate(bad, 0);
        sched.activate(after, 0);

        assert!(matches!(
            sched.process_event(),
            Err(SimError::InternalError(_))
        ));
        assert!(sched.is_active(after));

        // The scheduler keeps running afterwards.
        sched.process_event().unwrap();
        assert_eq!(*log.borrow(), vec!["AFTER"]);
    }

    #[test]
    fn test_stop_request_checked_first() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");
        sched.activate(a, 0);

        sched.stop_handle().request();
        assert!(matches!(sched.process_event(), Err(SimError::Stopped)));
        assert!(sched.is_active(a));

        sched.process_event().unwrap();
        assert_eq!(*log.borrow(), vec!["A"]);
    }

    #[test]
    fn test_stop_requested_by_action() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let stopper = sched.add_unit(Unit::new("STOP").with_action(|sched, _| {
            sched.request_stop();
            Ok(())
        }));
        let later = recording_unit(&mut sched, &log, "LATER");

        sched.activate(stopper, 0);
        sched.activate(later, 0);

        assert!(matches!(sched.process_event(), Err(SimError::Stopped)));
        assert!(log.borrow().is_empty());
        assert!(!sched.stop_handle().is_requested());
    }

    #[test]
    fn test_activate_after_converts_usecs() {
        let config = SchedulerConfig {
            instructions_per_second: 2_000_000.0,
            ..SchedulerConfig::default()
        };
        let mut sched = Scheduler::new(&config);
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        sched.activate_after(a, 10.0);
        assert_eq!(sched.activation_time(a), 21);
        assert_eq!(sched.activation_time_usecs(a), 11.0);
    }

    #[test]
    fn test_activate_after_splits_long_delay() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        assert_eq!(sched.activate_after(a, 3_000_000_000.0), Activation::Queued);

        assert_eq!(sched.unit(a).pending_async_delay(), 852_516_353.0);
        assert_eq!(sched.activation_time(a), i32::MAX);
        assert_eq!(sched.activation_time_usecs(a), 3_000_000_000.0);

        run_ticks(&mut sched, 1000);
        assert!(log.borrow().is_empty());
        assert!(sched.is_active(a));
    }

    #[test]
    fn test_activate_after_abs_replaces_pending_activation() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        sched.activate(a, 50);
        assert_eq!(sched.activate_after(a, 10.0), Activation::AlreadyActive);
        assert_eq!(sched.activate_after_abs(a, 10.0).unwrap(), Activation::Queued);
        assert_eq!(sched.activation_time(a), 11);

        sched.activate_after(a, 3_000_000_000.0);
        sched.activate_after_abs(a, 4.0).unwrap();
        assert_eq!(sched.unit(a).pending_async_delay(), 0.0);
        assert_eq!(sched.activation_time(a), 5);
        assert_eq!(sched.queue_len(), 1);

        run_ticks(&mut sched, 5);
        assert_eq!(*log.borrow(), vec!["A"]);
    }

    #[test]
    fn test_pending_delay_rearms_instead_of_firing() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        sched.activate(a, 0);
        sched.unit_mut(a).pending_async_delay = 5.0;
        sched.process_event().unwrap();

        assert!(log.borrow().is_empty());
        assert!(sched.is_active(a));
        assert_eq!(sched.unit(a).pending_async_delay(), 0.0);

        run_ticks(&mut sched, 6);
        assert_eq!(*log.borrow(), vec!["A"]);
    }

    #[test]
    fn test_cancel_clears_pending_delay() {
        let mut sched = Scheduler::default();
        let log = Log::default();
        let a = recording_unit(&mut sched, &log, "A");

        sched.activate(a, 3);
        sched.unit_mut(a).pending_async_delay = 9.0;
        sched.cancel(a).unwrap();

        assert_eq!(sched.unit(a).pending_async_delay(), 0.0);
    }
}
