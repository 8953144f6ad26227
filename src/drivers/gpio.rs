//! Digital output pins behind `embedded_hal::digital::OutputPin`.
//!
//! - [`SysfsPin`] drives a line through the Linux `/sys/class/gpio`
//!   interface (export, direction, value).
//! - [`SimPin`] keeps the level in memory, for bench runs without relays
//!   and for tests.  Its level is shared through an `Arc` so a test can
//!   observe it after the pin has been moved into a driver.
//! - [`OutputLine`] selects one of the two at runtime.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{info, warn};

use crate::error::ActuatorError;

// ── Sysfs ─────────────────────────────────────────────────────

pub struct SysfsPin {
    line: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `line` under `gpio_root` and configure it as an output
    /// starting at `initial_high`.
    pub fn export(gpio_root: &Path, line: u32, initial_high: bool) -> Result<Self, ActuatorError> {
        let line_dir = gpio_root.join(format!("gpio{line}"));
        if !line_dir.exists() {
            fs::write(gpio_root.join("export"), line.to_string()).map_err(|e| {
                warn!("GPIO{}: export failed: {}", line, e);
                ActuatorError::GpioSetupFailed
            })?;
        }
        // "high"/"low" sets direction and initial level in one write, so
        // the line never glitches through the wrong level.
        let direction = if initial_high { "high" } else { "low" };
        fs::write(line_dir.join("direction"), direction).map_err(|e| {
            warn!("GPIO{}: direction failed: {}", line, e);
            ActuatorError::GpioSetupFailed
        })?;
        info!("GPIO{}: output, initial {}", line, direction);
        Ok(Self {
            line,
            value_path: line_dir.join("value"),
        })
    }

    fn write_level(&mut self, high: bool) -> Result<(), ActuatorError> {
        fs::write(&self.value_path, if high { "1" } else { "0" }).map_err(|e| {
            warn!("GPIO{}: write failed: {}", self.line, e);
            ActuatorError::GpioWriteFailed
        })
    }
}

impl ErrorType for SysfsPin {
    type Error = ActuatorError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}

// ── Simulated ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new(initial_high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(initial_high)),
        }
    }

    /// Shared view of the electrical level (`true` = high).
    pub fn probe(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.level)
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl ErrorType for SimPin {
    type Error = ActuatorError;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.store(true, Ordering::Release);
        Ok(())
    }
}

// ── Runtime selection ─────────────────────────────────────────

pub enum OutputLine {
    Sysfs(SysfsPin),
    Sim(SimPin),
}

impl ErrorType for OutputLine {
    type Error = ActuatorError;
}

impl OutputPin for OutputLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Sysfs(p) => p.set_low(),
            Self::Sim(p) => p.set_low(),
        }
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Sysfs(p) => p.set_high(),
            Self::Sim(p) => p.set_high(),
        }
    }
}
