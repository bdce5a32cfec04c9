//! Devices and the device registry.

use log::debug;

use crate::attach::{attach_unit, detach_unit};
use crate::error::{SimError, SimResult};
use crate::media::MediaStore;
use crate::scheduler::Scheduler;
use crate::unit::UnitId;

/// Index of a device in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub(crate) usize);

/// A named group of units with lifecycle hooks.
///
/// Only `name` and `units` are required. The attach and detach hooks default
/// to the plain attach manager; `boot` defaults to `NoFunction`.
pub trait Device {
    fn name(&self) -> &str;

    fn units(&self) -> &[UnitId];

    fn reset(&mut self, _sched: &mut Scheduler) -> SimResult<()> {
        Ok(())
    }

    fn attach(
        &mut self,
        sched: &mut Scheduler,
        media: &mut dyn MediaStore,
        unit: UnitId,
        name: &str,
    ) -> SimResult<()> {
        attach_unit(sched.unit_mut(unit), media, name)
    }

    fn detach(&mut self, sched: &mut Scheduler, unit: UnitId) -> SimResult<()> {
        detach_unit(sched.unit_mut(unit))
    }

    fn boot(&mut self, _sched: &mut Scheduler, _unit: UnitId) -> SimResult<()> {
        Err(SimError::NoFunction)
    }
}

/// Registration-ordered table of devices.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: Vec<Box<dyn Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and claim its units. A device whose name is already
    /// registered is ignored and the existing id returned.
    pub fn register(&mut self, sched: &mut Scheduler, device: Box<dyn Device>) -> DeviceId {
        if let Some(id) = self.find_id(device.name()) {
            debug!("{} already registered", device.name());
            return id;
        }
        let id = DeviceId(self.devices.len());
        for &unit in device.units() {
            sched.unit_mut(unit).device = Some(id);
        }
        debug!("Registered {} with {} units", device.name(), device.units().len());
        self.devices.push(device);
        id
    }

    /// Look a device up by name, ignoring ASCII case.
    pub fn find_id(&self, name: &str) -> Option<DeviceId> {
        self.devices
            .iter()
            .position(|dev| dev.name().eq_ignore_ascii_case(name))
            .map(DeviceId)
    }

    pub fn find(&self, name: &str) -> Option<&dyn Device> {
        self.find_id(name).map(|id| self.devices[id.0].as_ref())
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut (dyn Device + 'static)> {
        let id = self.find_id(name)?;
        Some(self.devices[id.0].as_mut())
    }

    pub fn get(&self, id: DeviceId) -> &dyn Device {
        self.devices[id.0].as_ref()
    }

    pub fn get_mut(&mut self, id: DeviceId) -> &mut (dyn Device + 'static) {
        self.devices[id.0].as_mut()
    }

    /// The device that declared `unit`.
    pub fn device_of(&self, sched: &Scheduler, unit: UnitId) -> Option<&dyn Device> {
        sched.unit(unit).device().map(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Device> {
        self.devices.iter().map(|dev| dev.as_ref())
    }

    /// Reset every device in registration order, stopping at the first failure.
    pub fn reset_all(&mut self, sched: &mut Scheduler) -> SimResult<()> {
        for dev in &mut self.devices {
            dev.reset(sched)?;
        }
        Ok(())
    }
}
