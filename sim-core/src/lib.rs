//! Peripheral Scheduling Core
//!
//! This crate provides the event machinery a minicomputer simulator uses to
//! time its peripherals:
//! - Delta-encoded event queue and dispatcher
//! - Attach/detach of units to backing media, with optional in-memory buffering
//! - Completion bridge for sector transfers finishing after a wall-clock delay
//! - Device registry and a machine driver running an instruction stream
//!
//! # Architecture
//!
//! The core uses a layered design:
//! - `Scheduler`: owns every `Unit` and the queue linking the pending ones
//! - `Device` trait: named group of units with reset/attach/detach/boot hooks
//! - `MediaStore` trait: opens backing resources by name
//! - `IoBackend` trait: carries out transfers and delivers their completions
//! - `Machine`: integrates the above and drives an `InstructionStream`

pub mod attach;
pub mod completion;
pub mod config;
pub mod console;
pub mod device;
pub mod devices;
pub mod error;
pub mod machine;
pub mod media;
pub mod scheduler;
pub mod unit;

pub use attach::{attach_unit, detach_unit};
pub use completion::{Completion, DeferredBackend, IoBackend, IoOutcome, IoRequest, SyncBackend};
pub use config::{MachineConfig, SchedulerConfig};
pub use console::{Console, HeadlessConsole};
pub use device::{Device, DeviceId, DeviceRegistry};
pub use error::{SimError, SimResult};
pub use machine::{IdleStream, InstructionStream, Machine, Peripherals};
pub use media::{HostMediaStore, Media, MediaStore, MemoryMediaStore};
pub use scheduler::{Activation, Scheduler, StopHandle};
pub use unit::{QueueLink, Unit, UnitFlags, UnitId};

/// Reason a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// A stop status such as a stop request or the interrupt character.
    Stopped(String),
    /// The tick budget ran out.
    TickLimit,
}

/// Information about the end of a run.
#[derive(Debug, Clone)]
pub struct ExitInfo {
    pub reason: ExitReason,
    /// Ticks executed by this run.
    pub ticks: u64,
    /// Simulated time at exit.
    pub elapsed: f64,
}
