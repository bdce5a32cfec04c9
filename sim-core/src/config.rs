//! Machine description loaded from JSON.
//!
//! Every field has a default, so `{}` is a valid machine description.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Interval reported while the event queue is empty.
pub const NOQUEUE_WAIT: i32 = 1_000_000;

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Ticks the dispatcher waits before polling an empty queue again.
    pub noqueue_wait: i32,
    /// Tick rate used to convert wall-clock microseconds into ticks.
    pub instructions_per_second: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            noqueue_wait: NOQUEUE_WAIT,
            instructions_per_second: 1_000_000.0,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.noqueue_wait <= 0 {
            return Err(SimError::InvalidArgument(format!(
                "noqueueWait must be positive, got {}",
                self.noqueue_wait
            )));
        }
        if !(self.instructions_per_second.is_finite() && self.instructions_per_second > 0.0) {
            return Err(SimError::InvalidArgument(format!(
                "instructionsPerSecond must be positive, got {}",
                self.instructions_per_second
            )));
        }
        Ok(())
    }
}

/// Line-time clock settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClockConfig {
    pub enabled: bool,
    pub hz: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hz: 60,
        }
    }
}

/// Sector disk settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskConfig {
    pub drives: usize,
    pub sector_size: usize,
    pub sectors: u64,
    /// Read the whole image into memory at attach time.
    pub buffered: bool,
    pub read_only: bool,
    /// Completion latency in microseconds. Zero selects the synchronous backend.
    pub latency_usecs: f64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            drives: 1,
            sector_size: 512,
            sectors: 2048,
            buffered: false,
            read_only: false,
            latency_usecs: 0.0,
        }
    }
}

/// Terminal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalConfig {
    /// Ticks between keyboard polls.
    pub poll_ticks: i32,
    /// Ticks a character spends in the output shift register.
    pub output_ticks: i32,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            poll_ticks: 10_000,
            output_ticks: 100,
        }
    }
}

/// Media to attach at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachEntry {
    pub device: String,
    #[serde(default)]
    pub unit: usize,
    pub path: String,
}

/// Complete machine description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineConfig {
    pub scheduler: SchedulerConfig,
    pub clock: ClockConfig,
    pub disk: DiskConfig,
    pub terminal: TerminalConfig,
    pub attach: Vec<AttachEntry>,
    /// Tick budget for a run. `None` runs until stopped.
    pub run_ticks: Option<u64>,
    /// Device to boot after attaching media.
    pub boot: Option<String>,
}

impl MachineConfig {
    /// Parse and validate a machine description.
    pub fn from_json(text: &str) -> SimResult<Self> {
        let config: MachineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a machine description from a file.
    pub fn from_path(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> SimResult<()> {
        self.scheduler.validate()?;
        if self.disk.sector_size == 0 {
            return Err(SimError::InvalidArgument("sectorSize must be non-zero".into()));
        }
        if self.disk.sectors.checked_mul(self.disk.sector_size as u64).is_none() {
            return Err(SimError::InvalidArgument(format!(
                "disk of {} sectors of {} bytes is too large",
                self.disk.sectors, self.disk.sector_size
            )));
        }
        if self.terminal.poll_ticks <= 0 || self.terminal.output_ticks < 0 {
            return Err(SimError::InvalidArgument(
                "terminal tick counts must be positive".into(),
            ));
        }
        Ok(())
    }
}
