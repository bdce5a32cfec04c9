//! Host filesystem media.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use super::store::{Media, MediaStore};
use crate::error::{SimError, SimResult};

/// Opens host files, optionally relative to a base directory.
#[derive(Debug, Default, Clone)]
pub struct HostMediaStore {
    root: Option<PathBuf>,
}

impl HostMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative names against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(name),
            None => PathBuf::from(name),
        }
    }
}

impl MediaStore for HostMediaStore {
    fn open(&mut self, name: &str, read_only: bool) -> SimResult<Box<dyn Media>> {
        let path = self.resolve(name);
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(&path)
            .map_err(|source| SimError::OpenFailed {
                name: path.display().to_string(),
                source,
            })?;
        Ok(Box::new(FileMedia { file }))
    }
}

/// An opened host file.
pub struct FileMedia {
    file: File,
}

impl Media for FileMedia {
    fn len(&mut self) -> SimResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> SimResult<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> SimResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> SimResult<()> {
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_host_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("disk.img"), [0u8; 8]).unwrap();

        let mut store = HostMediaStore::with_root(dir.path());
        let mut media = store.open("disk.img", false).unwrap();
        media.write_at(4, b"abcd").unwrap();
        media.flush().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(media.read_at(0, &mut buf).unwrap(), 8);
        assert_eq!(&buf[4..8], b"abcd");
        assert_eq!(media.len().unwrap(), 8);
    }

    #[test]
    fn test_missing_file_reports_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HostMediaStore::with_root(dir.path());
        assert!(matches!(
            store.open("absent.img", true),
            Err(SimError::OpenFailed { .. })
        ));
    }
}
