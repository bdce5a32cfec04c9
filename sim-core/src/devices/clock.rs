//! Line-time clock.

use std::cell::Cell;
use std::rc::Rc;

use log::debug;

use crate::config::ClockConfig;
use crate::device::Device;
use crate::error::SimResult;
use crate::scheduler::Scheduler;
use crate::unit::{Unit, UnitId};

/// Fires `hz` times per simulated second and counts the ticks.
pub struct LineClock {
    units: [UnitId; 1],
    period: i32,
    enabled: bool,
    ticks: Rc<Cell<u64>>,
}

impl LineClock {
    pub fn new(sched: &mut Scheduler, config: &ClockConfig) -> Self {
        let hz = f64::from(config.hz.max(1));
        let period = (sched.instructions_per_second() / hz).clamp(1.0, i32::MAX as f64) as i32;
        let ticks = Rc::new(Cell::new(0u64));

        let counter = Rc::clone(&ticks);
        let unit = sched.add_unit(Unit::new("CLK").with_action(move |sched, id| {
            counter.set(counter.get() + 1);
            sched.activate(id, period);
            Ok(())
        }));

        Self {
            units: [unit],
            period,
            enabled: config.enabled,
            ticks,
        }
    }

    /// Ticks between clock interrupts.
    pub fn period(&self) -> i32 {
        self.period
    }

    /// Shared tick counter.
    pub fn counter(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.ticks)
    }
}

impl Device for LineClock {
    fn name(&self) -> &str {
        "CLK"
    }

    fn units(&self) -> &[UnitId] {
        &self.units
    }

    fn reset(&mut self, sched: &mut Scheduler) -> SimResult<()> {
        let unit = self.units[0];
        sched.cancel(unit)?;
        self.ticks.set(0);
        if self.enabled {
            debug!("CLK: period {} ticks", self.period);
            sched.activate(unit, self.period);
        }
        Ok(())
    }
}
