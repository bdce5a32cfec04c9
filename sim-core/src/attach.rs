//! Binding units to backing resources.

use log::{info, warn};

use crate::error::{SimError, SimResult};
use crate::media::MediaStore;
use crate::unit::{AttachState, Attachment, MemoryImage, Unit};

/// Attach `unit` to the resource `name`.
///
/// Buffered units read the whole resource into memory here, up to the unit's
/// capacity (or the resource size when the capacity is zero).
pub fn attach_unit(unit: &mut Unit, media: &mut dyn MediaStore, name: &str) -> SimResult<()> {
    if !unit.flags.attachable {
        return Err(SimError::NotAttachable);
    }
    if unit.is_attached() {
        return Err(SimError::AlreadyAttached);
    }

    let mut handle = media.open(name, unit.flags.read_only)?;
    let buffer = if unit.flags.buffered {
        let capacity = match unit.capacity {
            0 => handle.len()?,
            bytes => bytes,
        };
        let capacity = usize::try_from(capacity).map_err(|_| SimError::NoMemory)?;
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|_| SimError::NoMemory)?;
        data.resize(capacity, 0);

        info!("{}: buffering file in memory", unit.name);
        let high_water = handle.read_at(0, &mut data)?;
        Some(MemoryImage { data, high_water })
    } else {
        None
    };

    unit.attach = AttachState::Attached(Attachment {
        name: name.to_string(),
        media: handle,
        buffer,
        dirty: false,
    });
    unit.position = 0;
    Ok(())
}

/// Detach `unit` from its resource.
///
/// A dirty buffer is written back first. The unit ends up detached and its
/// buffer released whether or not that write succeeds.
pub fn detach_unit(unit: &mut Unit) -> SimResult<()> {
    if !unit.flags.attachable {
        return Err(SimError::NotAttachable);
    }
    let AttachState::Attached(mut att) = std::mem::take(&mut unit.attach) else {
        return Err(SimError::NotAttached);
    };
    unit.position = 0;

    let mut result = Ok(());
    if let Some(image) = att.buffer.take() {
        if att.dirty && !unit.flags.read_only && image.high_water > 0 {
            info!("{}: writing buffer to file", unit.name);
            result = att
                .media
                .write_at(0, &image.data[..image.high_water])
                .and_then(|_| att.media.flush());
            if let Err(err) = &result {
                warn!("{}: I/O error - {}", unit.name, err);
            }
        }
    }
    result
}
