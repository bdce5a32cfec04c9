//! In-memory media store.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::store::{Media, MediaStore};
use crate::error::{SimError, SimResult};

#[derive(Default)]
struct Images {
    data: HashMap<String, Vec<u8>>,
    writes: HashMap<String, usize>,
}

/// In-memory media store. Clones share the same images, so a test can keep
/// one clone and inspect what a detached unit wrote back.
#[derive(Default, Clone)]
pub struct MemoryMediaStore {
    images: Rc<RefCell<Images>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial images.
    pub fn with_images<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let store = Self::new();
        for (name, data) in images {
            store.add_image(name.as_ref(), data);
        }
        store
    }

    /// Add or replace an image.
    pub fn add_image(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.images
            .borrow_mut()
            .data
            .insert(name.to_string(), data.into());
    }

    /// Snapshot of an image's contents.
    pub fn image(&self, name: &str) -> Option<Vec<u8>> {
        self.images.borrow().data.get(name).cloned()
    }

    /// Number of write calls that reached an image.
    pub fn write_count(&self, name: &str) -> usize {
        self.images.borrow().writes.get(name).copied().unwrap_or(0)
    }
}

impl MediaStore for MemoryMediaStore {
    fn open(&mut self, name: &str, _read_only: bool) -> SimResult<Box<dyn Media>> {
        if !self.images.borrow().data.contains_key(name) {
            return Err(SimError::OpenFailed {
                name: name.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(Box::new(MemoryMedia {
            images: Rc::clone(&self.images),
            name: name.to_string(),
        }))
    }
}

/// Handle to one image of a [`MemoryMediaStore`].
pub struct MemoryMedia {
    images: Rc<RefCell<Images>>,
    name: String,
}

impl MemoryMedia {
    fn with_image<T>(&self, f: impl FnOnce(&mut Vec<u8>) -> T) -> SimResult<T> {
        let mut images = self.images.borrow_mut();
        let data = images
            .data
            .get_mut(&self.name)
            .ok_or_else(|| SimError::Io(std::io::ErrorKind::NotFound.into()))?;
        Ok(f(data))
    }
}

impl Media for MemoryMedia {
    fn len(&mut self) -> SimResult<u64> {
        self.with_image(|data| data.len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> SimResult<usize> {
        self.with_image(|data| {
            let start = usize::try_from(offset).map_or(data.len(), |o| o.min(data.len()));
            let end = start.saturating_add(buf.len()).min(data.len());
            buf[..end - start].copy_from_slice(&data[start..end]);
            end - start
        })
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> SimResult<()> {
        let start = usize::try_from(offset).map_err(|_| SimError::NonExistentAddress(offset))?;
        let end = start
            .checked_add(bytes.len())
            .ok_or(SimError::NonExistentAddress(offset))?;
        self.with_image(|data| -> SimResult<()> {
            if end > data.len() {
                data.try_reserve(end - data.len()).map_err(|_| SimError::NoMemory)?;
                data.resize(end, 0);
            }
            data[start..end].copy_from_slice(bytes);
            Ok(())
        })??;
        *self
            .images
            .borrow_mut()
            .writes
            .entry(self.name.clone())
            .or_insert(0) += 1;
        Ok(())
    }

    fn flush(&mut self) -> SimResult<()> {
        Ok(())
    }
}
