//! Machine - ties the scheduler, the device registry and a media store
//! together and drives an instruction stream against them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::{MachineConfig, SchedulerConfig};
use crate::console::Console;
use crate::device::{Device, DeviceId, DeviceRegistry};
use crate::devices::{DiskHandle, LineClock, SectorDisk, Terminal, TerminalHandle};
use crate::error::{SimError, SimResult};
use crate::media::MediaStore;
use crate::scheduler::{Scheduler, StopHandle};
use crate::unit::UnitId;
use crate::{ExitInfo, ExitReason};

/// The simulated processor, as seen by the scheduler: something that runs
/// one instruction per tick.
pub trait InstructionStream {
    fn execute(&mut self, sched: &mut Scheduler) -> SimResult<()>;
}

impl<F> InstructionStream for F
where
    F: FnMut(&mut Scheduler) -> SimResult<()>,
{
    fn execute(&mut self, sched: &mut Scheduler) -> SimResult<()> {
        self(sched)
    }
}

/// A processor that does nothing but let time pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleStream;

impl InstructionStream for IdleStream {
    fn execute(&mut self, _sched: &mut Scheduler) -> SimResult<()> {
        Ok(())
    }
}

/// Handles to the sample peripherals of a machine built from a description.
pub struct Peripherals {
    pub clock_ticks: Rc<Cell<u64>>,
    pub disk: DiskHandle,
    pub terminal: TerminalHandle,
}

pub struct Machine<S: MediaStore> {
    scheduler: Scheduler,
    devices: DeviceRegistry,
    media: S,
}

impl<S: MediaStore> Machine<S> {
    pub fn new(config: &SchedulerConfig, media: S) -> Self {
        Self {
            scheduler: Scheduler::new(config),
            devices: DeviceRegistry::new(),
            media,
        }
    }

    /// Build a machine with the CLK, DK and TT devices, attach the listed
    /// media, reset everything and boot if asked to.
    pub fn build(
        config: &MachineConfig,
        media: S,
        console: Rc<RefCell<dyn Console>>,
    ) -> SimResult<(Self, Peripherals)> {
        config.validate()?;
        let mut machine = Self::new(&config.scheduler, media);
        let sched = &mut machine.scheduler;

        let clock = LineClock::new(sched, &config.clock);
        let disk = SectorDisk::new(sched, &config.disk);
        let terminal = Terminal::new(sched, &config.terminal, console);
        let peripherals = Peripherals {
            clock_ticks: clock.counter(),
            disk: disk.handle(),
            terminal: terminal.handle(),
        };

        machine.register(Box::new(clock));
        machine.register(Box::new(disk));
        machine.register(Box::new(terminal));

        for entry in &config.attach {
            machine.attach(&entry.device, entry.unit, &entry.path)?;
        }
        machine.reset_all()?;
        if let Some(device) = &config.boot {
            machine.boot(device, 0)?;
        }
        Ok((machine, peripherals))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn media(&self) -> &S {
        &self.media
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    pub fn register(&mut self, device: Box<dyn Device>) -> DeviceId {
        self.devices.register(&mut self.scheduler, device)
    }

    fn locate(&self, device: &str, unit: usize) -> SimResult<(DeviceId, UnitId)> {
        let id = self
            .devices
            .find_id(device)
            .ok_or_else(|| SimError::UnknownDevice(device.to_string()))?;
        let unit = self
            .devices
            .get(id)
            .units()
            .get(unit)
            .copied()
            .ok_or_else(|| SimError::InvalidArgument(format!("{device} has no unit {unit}")))?;
        Ok((id, unit))
    }

    pub fn attach(&mut self, device: &str, unit: usize, name: &str) -> SimResult<()> {
        let (id, unit) = self.locate(device, unit)?;
        self.devices
            .get_mut(id)
            .attach(&mut self.scheduler, &mut self.media, unit, name)?;
        info!("{} attached to {}", self.scheduler.unit(unit).name(), name);
        Ok(())
    }

    pub fn detach(&mut self, device: &str, unit: usize) -> SimResult<()> {
        let (id, unit) = self.locate(device, unit)?;
        self.devices.get_mut(id).detach(&mut self.scheduler, unit)
    }

    /// Detach every attached unit, carrying on past failures. Returns the
    /// first failure.
    pub fn detach_all(&mut self) -> SimResult<()> {
        let mut first_err = None;
        for index in 0..self.devices.len() {
            let id = DeviceId(index);
            let units = self.devices.get(id).units().to_vec();
            for unit in units {
                if !self.scheduler.unit(unit).is_attached() {
                    continue;
                }
                if let Err(err) = self.devices.get_mut(id).detach(&mut self.scheduler, unit) {
                    warn!("{}: detach failed - {}", self.scheduler.unit(unit).name(), err);
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn reset_all(&mut self) -> SimResult<()> {
        self.devices.reset_all(&mut self.scheduler)
    }

    pub fn boot(&mut self, device: &str, unit: usize) -> SimResult<()> {
        let (id, unit) = self.locate(device, unit)?;
        self.devices.get_mut(id).boot(&mut self.scheduler, unit)
    }

    /// Run `stream` one tick at a time until a stop or `max_ticks`.
    ///
    /// Expected stops end the run normally; any other error is returned.
    pub fn run(
        &mut self,
        stream: &mut dyn InstructionStream,
        max_ticks: Option<u64>,
    ) -> SimResult<ExitInfo> {
        let mut ticks = 0u64;
        loop {
            if max_ticks.is_some_and(|max| ticks >= max) {
                return Ok(self.exit_info(ExitReason::TickLimit, ticks));
            }

            let step = if self.scheduler.interval() <= 0 {
                self.scheduler.process_event()
            } else {
                Ok(())
            };
            match step.and_then(|_| stream.execute(&mut self.scheduler)) {
                Ok(()) => {}
                Err(err) if err.is_expected_stop() => {
                    debug!("Simulation stopped after {} ticks: {}", ticks, err);
                    return Ok(self.exit_info(ExitReason::Stopped(err.to_string()), ticks));
                }
                Err(err) => return Err(err),
            }

            self.scheduler.consume(1);
            ticks += 1;
        }
    }

    fn exit_info(&self, reason: ExitReason, ticks: u64) -> ExitInfo {
        ExitInfo {
            reason,
            ticks,
            elapsed: self.scheduler.elapsed(),
        }
    }
}
