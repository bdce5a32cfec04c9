//! Sector I/O with completion callbacks.
//!
//! A device submits a transfer together with a [`Completion`]. The callback
//! runs exactly once, after the data has been moved to or from the unit's
//! resource. The synchronous backend calls it inline; the deferred backend
//! parks it on the unit and lets the dispatcher deliver it once the unit's
//! wall-clock latency has elapsed.

use log::debug;

use crate::error::{SimError, SimResult};
use crate::scheduler::Scheduler;
use crate::unit::{Unit, UnitId};

/// A sector transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoRequest {
    Read { lba: u64, sectors: u32 },
    Write { lba: u64, data: Vec<u8> },
}

/// Result of a transfer, handed to the completion callback.
#[derive(Debug)]
pub struct IoOutcome {
    pub status: SimResult<()>,
    /// Sectors read; empty for writes.
    pub data: Vec<u8>,
    /// Whole sectors transferred.
    pub sectors: u32,
}

/// Callback receiving a finished transfer.
pub type Completion = Box<dyn FnOnce(&mut Scheduler, UnitId, IoOutcome) -> SimResult<()>>;

/// A finished transfer waiting for the dispatcher to deliver it.
pub(crate) struct PendingCompletion {
    callback: Completion,
    outcome: IoOutcome,
}

impl PendingCompletion {
    pub(crate) fn deliver(self, sched: &mut Scheduler, unit: UnitId) -> SimResult<()> {
        (self.callback)(sched, unit, self.outcome)
    }
}

/// Carries out sector transfers for a device.
pub trait IoBackend {
    fn submit(
        &self,
        sched: &mut Scheduler,
        unit: UnitId,
        request: IoRequest,
        done: Completion,
    ) -> SimResult<()>;
}

/// Byte offset of a `bytes`-long transfer at `lba`. The whole span must fit
/// the unit's capacity; arithmetic overflow counts as out of range.
fn sector_span(unit: &Unit, sector_size: usize, lba: u64, bytes: usize) -> SimResult<u64> {
    if sector_size == 0 {
        return Err(SimError::InvalidArgument("sector size is zero".into()));
    }
    let offset = lba
        .checked_mul(sector_size as u64)
        .ok_or(SimError::NonExistentAddress(u64::MAX))?;
    let end = offset
        .checked_add(bytes as u64)
        .ok_or(SimError::NonExistentAddress(offset))?;
    if unit.capacity != 0 && end > unit.capacity {
        return Err(SimError::NonExistentAddress(offset));
    }
    Ok(offset)
}

fn failed(err: SimError) -> IoOutcome {
    IoOutcome {
        status: Err(err),
        data: Vec::new(),
        sectors: 0,
    }
}

/// Move the data of `request` between the unit's resource and memory.
pub fn transfer(unit: &mut Unit, sector_size: usize, request: &IoRequest) -> IoOutcome {
    match request {
        IoRequest::Read { lba, sectors } => {
            let Some(bytes) = sector_size.checked_mul(*sectors as usize) else {
                return failed(SimError::NoMemory);
            };
            let offset = match sector_span(unit, sector_size, *lba, bytes) {
                Ok(offset) => offset,
                Err(err) => return failed(err),
            };
            let mut data = Vec::new();
            if data.try_reserve_exact(bytes).is_err() {
                return failed(SimError::NoMemory);
            }
            data.resize(bytes, 0);

            match unit.read_at(offset, &mut data) {
                Ok(read) => IoOutcome {
                    status: Ok(()),
                    data,
                    sectors: (read / sector_size) as u32,
                },
                Err(err) => IoOutcome {
                    status: Err(err),
                    data,
                    sectors: 0,
                },
            }
        }
        IoRequest::Write { lba, data } => {
            if sector_size == 0 || data.len() % sector_size != 0 {
                return failed(SimError::InvalidArgument(format!(
                    "write of {} bytes is not a whole number of {}-byte sectors",
                    data.len(),
                    sector_size
                )));
            }
            let offset = match sector_span(unit, sector_size, *lba, data.len()) {
                Ok(offset) => offset,
                Err(err) => return failed(err),
            };
            let status = unit.write_at(offset, data);
            let sectors = if status.is_ok() {
                (data.len() / sector_size) as u32
            } else {
                0
            };
            IoOutcome {
                status,
                data: Vec::new(),
                sectors,
            }
        }
    }
}

/// Completes every transfer inline, before `submit` returns.
#[derive(Debug, Clone)]
pub struct SyncBackend {
    sector_size: usize,
}

impl SyncBackend {
    pub fn new(sector_size: usize) -> Self {
        Self { sector_size }
    }
}

impl IoBackend for SyncBackend {
    fn submit(
        &self,
        sched: &mut Scheduler,
        unit: UnitId,
        request: IoRequest,
        done: Completion,
    ) -> SimResult<()> {
        let outcome = transfer(sched.unit_mut(unit), self.sector_size, &request);
        done(sched, unit, outcome)
    }
}

/// Completes each transfer after a wall-clock latency.
///
/// The data moves at submit time; only the callback is held back. One
/// transfer per unit may be in flight.
#[derive(Debug, Clone)]
pub struct DeferredBackend {
    sector_size: usize,
    latency_usecs: f64,
}

impl DeferredBackend {
    pub fn new(sector_size: usize, latency_usecs: f64) -> Self {
        Self {
            sector_size,
            latency_usecs,
        }
    }
}

impl IoBackend for DeferredBackend {
    fn submit(
        &self,
        sched: &mut Scheduler,
        unit: UnitId,
        request: IoRequest,
        done: Completion,
    ) -> SimResult<()> {
        if sched.io_pending(unit) {
            return Err(SimError::InternalError(format!(
                "{}: transfer already in flight",
                sched.unit(unit).name()
            )));
        }
        let outcome = transfer(sched.unit_mut(unit), self.sector_size, &request);

        sched.cancel(unit)?;
        let slot = sched.unit_mut(unit);
        slot.completion = Some(PendingCompletion {
            callback: done,
            outcome,
        });
        slot.pending_async_delay = self.latency_usecs.max(0.0);
        debug!(
            "{}: completion deferred {:.0} usecs",
            slot.name(),
            self.latency_usecs
        );
        sched.activate(unit, 0);
        Ok(())
    }
}

impl Scheduler {
    /// True while a deferred transfer on `unit` awaits delivery.
    pub fn io_pending(&self, unit: UnitId) -> bool {
        self.unit(unit).completion.is_some()
    }
}
