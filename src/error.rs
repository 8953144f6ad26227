//! Unified error types for the chiller controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! command boundary and the adapters uniform.  All variants are `Copy` so
//! they can be passed through the controller without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned unusable data.
    Sensor(SensorError),
    /// A relay output could not be driven.
    Actuator(ActuatorError),
    /// A remote or console command was rejected.
    Command(CommandError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The device file does not exist (probe unplugged or never bound).
    NotFound,
    /// The bus reported a CRC failure for the last conversion.
    CrcMismatch,
    /// The device file did not contain a parsable temperature.
    Malformed,
    /// Any other read failure.
    Io,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "device not found"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::Malformed => write!(f, "malformed reading"),
            Self::Io => write!(f, "read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO line could not be exported or configured as an output.
    GpioSetupFailed,
    /// GPIO level write failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioSetupFailed => write!(f, "GPIO setup failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl embedded_hal::digital::Error for ActuatorError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults are accumulated in a bitfield by the safety supervisor so
/// that several can be active at once and cleared individually.  None of
/// them stop the control loop: a critical sensor fault holds the condenser
/// off in auto mode, comms loss is reported only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// At least one critical temperature probe is not reading.
    CriticalSensor = 0b0000_0001,
    /// No remote traffic within the fail-safe window.
    CommsLost = 0b0000_0010,
}

impl SafetyFault {
    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CriticalSensor => write!(f, "critical sensor fault"),
            Self::CommsLost => write!(f, "remote comms lost"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Temperature value was NaN or infinite.
    NonFiniteValue,
    /// Differential must be strictly positive.
    NonPositiveDifferential,
    /// Command word not recognised.
    UnknownCommand,
    /// A required argument was missing.
    MissingArgument,
    /// An argument could not be parsed.
    InvalidArgument,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteValue => write!(f, "value must be finite"),
            Self::NonPositiveDifferential => write!(f, "differential must be > 0"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::MissingArgument => write!(f, "missing argument"),
            Self::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}
