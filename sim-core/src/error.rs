//! Status codes for the simulation core.
//!
//! `Ok(())` is the OK status; every other member of the closed status
//! enumeration is a variant of [`SimError`].

use thiserror::Error;

/// First status code reserved for the core. Device-specific stop codes live below it.
pub const STATUS_BASE: u32 = 64;

/// Errors and non-OK statuses returned by the simulation core.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Unit not attachable")]
    NotAttachable,

    #[error("Unit not attached")]
    NotAttached,

    #[error("Unit already attached")]
    AlreadyAttached,

    #[error("Cannot open {name}: {source}")]
    OpenFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Memory exhausted")]
    NoMemory,

    #[error("Address {0:#x} beyond end of unit")]
    NonExistentAddress(u64),

    #[error("Unit is read only")]
    ReadOnly,

    #[error("Simulation stopped")]
    Stopped,

    #[error("Step expired")]
    Step,

    #[error("Expect matched")]
    Expect,

    #[error("Remote console command")]
    Remote,

    #[error("Exit requested")]
    Exit,

    #[error("Run time limit exhausted")]
    RunTimeLimit,

    #[error("Device stop code {0}")]
    DeviceStop(u32),

    #[error("No function")]
    NoFunction,

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl SimError {
    /// Numeric status code, stable across releases.
    pub fn code(&self) -> u32 {
        match self {
            SimError::DeviceStop(code) => *code,
            SimError::NonExistentAddress(_) => STATUS_BASE + 1,
            SimError::NotAttached => STATUS_BASE + 2,
            SimError::Io(_) => STATUS_BASE + 3,
            SimError::Stopped => STATUS_BASE + 5,
            SimError::NotAttachable => STATUS_BASE + 7,
            SimError::OpenFailed { .. } => STATUS_BASE + 8,
            SimError::NoMemory => STATUS_BASE + 9,
            SimError::InvalidArgument(_) => STATUS_BASE + 10,
            SimError::Step => STATUS_BASE + 11,
            SimError::UnknownDevice(_) => STATUS_BASE + 15,
            SimError::ReadOnly => STATUS_BASE + 16,
            SimError::NoFunction => STATUS_BASE + 18,
            SimError::InternalError(_) => STATUS_BASE + 19,
            SimError::AlreadyAttached => STATUS_BASE + 20,
            SimError::Exit => STATUS_BASE + 33,
            SimError::Remote => STATUS_BASE + 36,
            SimError::Expect => STATUS_BASE + 39,
            SimError::RunTimeLimit => STATUS_BASE + 41,
            SimError::Config(_) => STATUS_BASE + 42,
        }
    }

    /// Statuses that end event processing without being an anomaly.
    pub fn is_expected_stop(&self) -> bool {
        matches!(
            self,
            SimError::Stopped
                | SimError::Step
                | SimError::Expect
                | SimError::Remote
                | SimError::Exit
                | SimError::RunTimeLimit
                | SimError::DeviceStop(_)
        )
    }
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
