//! Media traits - the resource side of the attach contract.

use crate::error::SimResult;

/// Handle to one opened backing resource.
pub trait Media {
    /// Current size in bytes.
    fn len(&mut self) -> SimResult<u64>;

    /// Returns true if the resource holds no data.
    fn is_empty(&mut self) -> SimResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read into `buf` starting at `offset`. Returns the number of bytes read,
    /// which is short only at end of resource.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> SimResult<usize>;

    /// Write all of `data` at `offset`, extending the resource if needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> SimResult<()>;

    /// Push buffered writes down to the resource.
    fn flush(&mut self) -> SimResult<()>;
}

/// Opens backing resources by name.
pub trait MediaStore {
    fn open(&mut self, name: &str, read_only: bool) -> SimResult<Box<dyn Media>>;
}
