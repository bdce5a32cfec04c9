//! Sample peripherals built on the scheduling core.
//!
//! - `LineClock` (CLK): periodic line-time interrupt source
//! - `SectorDisk` (DK): flat sector-addressed disk drives
//! - `Terminal` (TTI/TTO): keyboard polling and character output

mod clock;
mod disk;
mod terminal;

pub use clock::LineClock;
pub use disk::{DiskHandle, DiskStats, SectorDisk};
pub use terminal::{Terminal, TerminalHandle, INTERRUPT_CHAR};
