//! Sector-addressed disk.
//!
//! Each drive is one attachable unit holding a flat image of fixed-size
//! sectors. Transfers go through an [`IoBackend`]: the synchronous backend
//! when the configured latency is zero, the deferred one otherwise.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info};

use crate::completion::{Completion, DeferredBackend, IoBackend, IoOutcome, IoRequest, SyncBackend};
use crate::config::DiskConfig;
use crate::device::Device;
use crate::error::{SimError, SimResult};
use crate::scheduler::Scheduler;
use crate::unit::{Unit, UnitId};

/// Transfer counters shared by every handle to a disk.
#[derive(Debug, Default)]
pub struct DiskStats {
    pub reads: Cell<u64>,
    pub writes: Cell<u64>,
    pub errors: Cell<u64>,
}

impl DiskStats {
    fn record(&self, request: &IoRequest, outcome: &IoOutcome) {
        let counter = match (request, &outcome.status) {
            (_, Err(_)) => &self.errors,
            (IoRequest::Read { .. }, Ok(())) => &self.reads,
            (IoRequest::Write { .. }, Ok(())) => &self.writes,
        };
        counter.set(counter.get() + 1);
    }
}

/// Cloneable front end that issues transfers to a disk's drives.
#[derive(Clone)]
pub struct DiskHandle {
    units: Rc<[UnitId]>,
    sector_size: usize,
    backend: Rc<dyn IoBackend>,
    stats: Rc<DiskStats>,
}

impl DiskHandle {
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn unit(&self, drive: usize) -> SimResult<UnitId> {
        self.units
            .get(drive)
            .copied()
            .ok_or_else(|| SimError::InvalidArgument(format!("no drive DK{drive}")))
    }

    pub fn stats(&self) -> &DiskStats {
        &self.stats
    }

    pub fn read(
        &self,
        sched: &mut Scheduler,
        drive: usize,
        lba: u64,
        sectors: u32,
        done: Completion,
    ) -> SimResult<()> {
        self.submit(sched, drive, IoRequest::Read { lba, sectors }, done)
    }

    pub fn write(
        &self,
        sched: &mut Scheduler,
        drive: usize,
        lba: u64,
        data: Vec<u8>,
        done: Completion,
    ) -> SimResult<()> {
        self.submit(sched, drive, IoRequest::Write { lba, data }, done)
    }

    fn submit(
        &self,
        sched: &mut Scheduler,
        drive: usize,
        request: IoRequest,
        done: Completion,
    ) -> SimResult<()> {
        let unit = self.unit(drive)?;
        if !sched.unit(unit).is_attached() {
            return Err(SimError::NotAttached);
        }
        debug!("{}: {}", sched.unit(unit).name(), request_summary(&request));

        let stats = Rc::clone(&self.stats);
        let counted = request_kind(&request);
        let done: Completion = Box::new(move |sched, unit, outcome| {
            stats.record(&counted, &outcome);
            done(sched, unit, outcome)
        });
        self.backend.submit(sched, unit, request, done)
    }
}

// Shape of a request without its payload, for logging and counting.
fn request_kind(request: &IoRequest) -> IoRequest {
    match request {
        IoRequest::Read { lba, sectors } => IoRequest::Read {
            lba: *lba,
            sectors: *sectors,
        },
        IoRequest::Write { lba, .. } => IoRequest::Write {
            lba: *lba,
            data: Vec::new(),
        },
    }
}

fn request_summary(request: &IoRequest) -> String {
    match request {
        IoRequest::Read { lba, sectors } => format!("read lba={lba} sectors={sectors}"),
        IoRequest::Write { lba, data } => format!("write lba={lba} bytes={}", data.len()),
    }
}

/// The DK device: one or more sector drives sharing a backend.
pub struct SectorDisk {
    handle: DiskHandle,
    boot_sector: Rc<RefCell<Option<Vec<u8>>>>,
}

impl SectorDisk {
    pub fn new(sched: &mut Scheduler, config: &DiskConfig) -> Self {
        let capacity = config.sectors.saturating_mul(config.sector_size as u64);
        let units: Vec<UnitId> = (0..config.drives)
            .map(|drive| {
                let mut unit = Unit::new(format!("DK{drive}"))
                    .attachable()
                    .with_capacity(capacity);
                if config.buffered {
                    unit = unit.buffered();
                }
                if config.read_only {
                    unit = unit.read_only();
                }
                sched.add_unit(unit)
            })
            .collect();

        let backend: Rc<dyn IoBackend> = if config.latency_usecs > 0.0 {
            Rc::new(DeferredBackend::new(config.sector_size, config.latency_usecs))
        } else {
            Rc::new(SyncBackend::new(config.sector_size))
        };

        Self {
            handle: DiskHandle {
                units: units.into(),
                sector_size: config.sector_size,
                backend,
                stats: Rc::default(),
            },
            boot_sector: Rc::default(),
        }
    }

    pub fn handle(&self) -> DiskHandle {
        self.handle.clone()
    }

    /// Sector 0 as read by the last boot, once its transfer has completed.
    pub fn boot_sector(&self) -> Option<Vec<u8>> {
        self.boot_sector.borrow().clone()
    }
}

impl Device for SectorDisk {
    fn name(&self) -> &str {
        "DK"
    }

    fn units(&self) -> &[UnitId] {
        &self.handle.units
    }

    fn reset(&mut self, sched: &mut Scheduler) -> SimResult<()> {
        for &unit in self.handle.units.iter() {
            sched.cancel(unit)?;
            // A parked completion still owes its caller one delivery.
            if sched.io_pending(unit) {
                sched.activate(unit, 0);
            }
        }
        Ok(())
    }

    fn boot(&mut self, sched: &mut Scheduler, unit: UnitId) -> SimResult<()> {
        let drive = self
            .handle
            .units
            .iter()
            .position(|&u| u == unit)
            .ok_or_else(|| {
                SimError::InvalidArgument(format!("unit {} is not a DK drive", unit.index()))
            })?;
        info!("Booting from DK{drive}");

        self.boot_sector.replace(None);
        let slot = Rc::clone(&self.boot_sector);
        self.handle.read(
            sched,
            drive,
            0,
            1,
            Box::new(move |_, _, outcome| {
                outcome.status?;
                slot.replace(Some(outcome.data));
                Ok(())
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach::attach_unit;
    use crate::media::MemoryMediaStore;

    fn config(latency_usecs: f64) -> DiskConfig {
        DiskConfig {
            drives: 2,
            sector_size: 4,
            sectors: 4,
            latency_usecs,
            ..DiskConfig::default()
        }
    }

    fn attached_disk(sched: &mut Scheduler, config: &DiskConfig) -> (SectorDisk, MemoryMediaStore) {
        let mut store = MemoryMediaStore::with_images([("dk0.dsk", (0u8..16).collect::<Vec<_>>())]);
        let disk = SectorDisk::new(sched, config);
        let unit = disk.units()[0];
        attach_unit(sched.unit_mut(unit), &mut store, "dk0.dsk").unwrap();
        (disk, store)
    }

    #[test]
    fn test_units_are_named_per_drive() {
        let mut sched = Scheduler::default();
        let disk = SectorDisk::new(&mut sched, &config(0.0));

        let names: Vec<_> = disk
            .units()
            .iter()
            .map(|&u| sched.unit(u).name().to_string())
            .collect();
        assert_eq!(names, vec!["DK0", "DK1"]);
        assert_eq!(sched.unit(disk.units()[0]).capacity, 16);
    }

    #[test]
    fn test_boot_reads_sector_zero() {
        let mut sched = Scheduler::default();
        let (mut disk, _store) = attached_disk(&mut sched, &config(0.0));
        let unit = disk.units()[0];

        disk.boot(&mut sched, unit).unwrap();

        assert_eq!(disk.boot_sector(), Some(vec![0, 1, 2, 3]));
        assert_eq!(disk.handle().stats().reads.get(), 1);
    }

    #[test]
    fn test_boot_from_detached_drive() {
        let mut sched = Scheduler::default();
        let (mut disk, _store) = attached_disk(&mut sched, &config(0.0));
        let unit = disk.units()[1];

        assert!(matches!(disk.boot(&mut sched, unit), Err(SimError::NotAttached)));
        assert_eq!(disk.boot_sector(), None);
    }

    #[test]
    fn test_deferred_write_completes_after_latency() {
        let mut sched = Scheduler::default();
        let (disk, store) = attached_disk(&mut sched, &config(20.0));
        let handle = disk.handle();
        let done = Rc::new(Cell::new(false));

        let flag = Rc::clone(&done);
        handle
            .write(
                &mut sched,
                0,
                3,
                vec![0xAA; 4],
                Box::new(move |_, _, outcome| {
                    outcome.status?;
                    flag.set(true);
                    Ok(())
                }),
            )
            .unwrap();

        assert_eq!(&store.image("dk0.dsk").unwrap()[12..], &[0xAA; 4]);
        assert!(!done.get());

        for _ in 0..25 {
            sched.tick().unwrap();
        }
        assert!(done.get());
        assert_eq!(handle.stats().writes.get(), 1);
    }

    #[test]
    fn test_reset_still_delivers_parked_completion() {
        let mut sched = Scheduler::default();
        let (mut disk, _store) = attached_disk(&mut sched, &config(1000.0));
        let handle = disk.handle();
        let delivered = Rc::new(Cell::new(0));

        let count = Rc::clone(&delivered);
        handle
            .read(
                &mut sched,
                0,
                0,
                1,
                Box::new(move |_, _, _| {
                    count.set(count.get() + 1);
                    Ok(())
                }),
            )
            .unwrap();
        disk.reset(&mut sched).unwrap();

        sched.tick().unwrap();
        assert_eq!(delivered.get(), 1);
        assert!(!sched.io_pending(handle.unit(0).unwrap()));
    }

    #[test]
    fn test_unknown_drive() {
        let mut sched = Scheduler::default();
        let disk = SectorDisk::new(&mut sched, &config(0.0));

        let result = disk
            .handle()
            .read(&mut sched, 7, 0, 1, Box::new(|_, _, _| Ok(())));
        assert!(matches!(result, Err(SimError::InvalidArgument(_))));
    }
}
