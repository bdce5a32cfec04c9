//! Backing resources for attachable units.
//!
//! - `Media`: byte-addressed handle to one attached resource
//! - `MediaStore`: opens resources by name
//! - `HostMediaStore`: host files
//! - `MemoryMediaStore`: in-memory images, shared with the caller

mod host;
mod memory;
mod store;

pub use host::{FileMedia, HostMediaStore};
pub use memory::{MemoryMedia, MemoryMediaStore};
pub use store::{Media, MediaStore};
