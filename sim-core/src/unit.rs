//! Units - the schedulable endpoints of a device.
//!
//! A unit carries its queue linkage, its action callback and, when attached,
//! its backing resource. Units are created once, handed to the
//! [`Scheduler`](crate::Scheduler) and addressed by [`UnitId`] from then on.

use std::fmt;

use crate::completion::PendingCompletion;
use crate::device::DeviceId;
use crate::error::{SimError, SimResult};
use crate::media::Media;
use crate::scheduler::Scheduler;

/// Index of a unit in its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Link from a queued unit to whatever fires after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLink {
    /// Last entry of the queue.
    End,
    Next(UnitId),
}

/// Action invoked when a unit fires.
pub type UnitAction = Box<dyn FnMut(&mut Scheduler, UnitId) -> SimResult<()>>;

/// Returns true to swallow a cancellation before the queue is touched.
pub type CancelHook = Box<dyn FnMut(UnitId) -> bool>;

/// Static capabilities of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitFlags {
    pub attachable: bool,
    /// Read the whole resource into memory on attach.
    pub buffered: bool,
    pub read_only: bool,
}

/// In-memory copy of an attached resource.
pub struct MemoryImage {
    pub data: Vec<u8>,
    /// Bytes that hold resource data, either read at attach time or written since.
    pub high_water: usize,
}

/// A unit's binding to a backing resource.
pub struct Attachment {
    pub name: String,
    pub media: Box<dyn Media>,
    pub buffer: Option<MemoryImage>,
    pub dirty: bool,
}

#[derive(Default)]
pub enum AttachState {
    #[default]
    Detached,
    Attached(Attachment),
}

/// One schedulable endpoint.
pub struct Unit {
    pub(crate) name: String,
    pub(crate) device: Option<DeviceId>,
    pub(crate) flags: UnitFlags,
    /// Ticks between this unit and the previous queue entry.
    pub(crate) time: i32,
    /// `None` while idle.
    pub(crate) next: Option<QueueLink>,
    pub(crate) action: Option<UnitAction>,
    pub(crate) cancel_hook: Option<CancelHook>,
    /// Wall-clock microseconds still to elapse before the unit really fires.
    pub(crate) pending_async_delay: f64,
    pub(crate) completion: Option<PendingCompletion>,
    pub(crate) attach: AttachState,
    /// Resource size in bytes.
    pub capacity: u64,
    /// Current offset into the resource.
    pub position: u64,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: None,
            flags: UnitFlags::default(),
            time: 0,
            next: None,
            action: None,
            cancel_hook: None,
            pending_async_delay: 0.0,
            completion: None,
            attach: AttachState::Detached,
            capacity: 0,
            position: 0,
        }
    }

    pub fn attachable(mut self) -> Self {
        self.flags.attachable = true;
        self
    }

    pub fn buffered(mut self) -> Self {
        self.flags.buffered = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.flags.read_only = true;
        self
    }

    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = bytes;
        self
    }

    pub fn with_action(
        mut self,
        action: impl FnMut(&mut Scheduler, UnitId) -> SimResult<()> + 'static,
    ) -> Self {
        self.action = Some(Box::new(action));
        self
    }

    pub fn with_cancel_hook(mut self, hook: impl FnMut(UnitId) -> bool + 'static) -> Self {
        self.cancel_hook = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> UnitFlags {
        self.flags
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn pending_async_delay(&self) -> f64 {
        self.pending_async_delay
    }

    pub fn attach_state(&self) -> &AttachState {
        &self.attach
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.attach, AttachState::Attached(_))
    }

    /// Name of the attached resource.
    pub fn attached_name(&self) -> Option<&str> {
        match &self.attach {
            AttachState::Attached(att) => Some(&att.name),
            AttachState::Detached => None,
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(&self.attach, AttachState::Attached(att) if att.buffer.is_some())
    }

    pub fn is_dirty(&self) -> bool {
        matches!(&self.attach, AttachState::Attached(att) if att.dirty)
    }

    /// Read from the attached resource. Bytes past the end read as zero.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> SimResult<usize> {
        let capacity = self.capacity;
        let AttachState::Attached(att) = &mut self.attach else {
            return Err(SimError::NotAttached);
        };
        match &att.buffer {
            Some(image) => {
                let start = usize::try_from(offset)
                    .ok()
                    .filter(|&start| start < image.data.len())
                    .ok_or(SimError::NonExistentAddress(offset))?;
                let end = start.saturating_add(buf.len()).min(image.data.len());
                buf[..end - start].copy_from_slice(&image.data[start..end]);
                buf[end - start..].fill(0);
                Ok(end - start)
            }
            None => {
                if capacity != 0 && offset >= capacity {
                    return Err(SimError::NonExistentAddress(offset));
                }
                let read = att.media.read_at(offset, buf)?;
                buf[read..].fill(0);
                Ok(read)
            }
        }
    }

    /// Write to the attached resource. Buffered units only touch memory and
    /// become dirty.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> SimResult<()> {
        if self.flags.read_only {
            return Err(SimError::ReadOnly);
        }
        let capacity = self.capacity;
        let AttachState::Attached(att) = &mut self.attach else {
            return Err(SimError::NotAttached);
        };
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(SimError::NonExistentAddress(offset))?;
        if capacity != 0 && end > capacity {
            return Err(SimError::NonExistentAddress(end - 1));
        }
        match &mut att.buffer {
            Some(image) => {
                let (start, end) = match (usize::try_from(offset), usize::try_from(end)) {
                    (Ok(start), Ok(end)) if end <= image.data.len() => (start, end),
                    _ => return Err(SimError::NonExistentAddress(offset)),
                };
                image.data[start..end].copy_from_slice(data);
                image.high_water = image.high_water.max(end);
                att.dirty = true;
                Ok(())
            }
            None => att.media.write_at(offset, data),
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("time", &self.time)
            .field("next", &self.next)
            .field("attached", &self.attached_name())
            .field("capacity", &self.capacity)
            .finish()
    }
}
