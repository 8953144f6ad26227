//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (temperature probes, relays, event sinks, storage,
//! clock) implement these traits.  The [`Controller`](super::service::Controller)
//! consumes them via generics, so the domain core never touches hardware,
//! files or wall-clock time directly.

use embassy_time::Instant;
use heapless::Vec;

use crate::config::SystemConfig;
use crate::error::ActuatorError;
use crate::state::{MAX_SENSORS, Relay, SensorKey};

/// One poll's worth of readings.  `None` marks a sensor that could not be
/// read; it is never reported as zero.
pub type TemperatureBatch = Vec<(SensorKey, Option<f32>), MAX_SENSORS>;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the sensing loop calls this to obtain temperatures.
pub trait SensorPort {
    /// Read every configured probe, in °F.
    fn read_all(&mut self) -> TemperatureBatch;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the control loop calls this only when a relay's
/// commanded state changes.  Signal polarity is the adapter's concern.
pub trait ActuatorPort {
    /// Energise (`true`) or release (`false`) one relay.
    fn set_relay(&mut self, relay: Relay, on: bool) -> Result<(), ActuatorError>;

    /// Release every relay: safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (log, supervisor
/// link, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: disk → domain)
// ───────────────────────────────────────────────────────────────

/// Loads the static system configuration.
///
/// Implementations MUST run [`validate_config`](crate::config::validate_config)
/// before returning.  Invalid ranges are rejected with
/// [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    fn load(&self) -> Result<SystemConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ persistent records)
// ───────────────────────────────────────────────────────────────

/// Whole-record key/value storage for the persisted operating parameters.
///
/// - Writes replace the whole record and MUST be atomic: a reader sees
///   the previous record or the new one, never a torn write.
/// - Methods take `&self`; the controller calls them from whichever
///   thread changed a value, so implementations synchronise internally.
pub trait StoragePort: Send + Sync {
    /// Read a whole record.
    fn read(&self, key: &str) -> Result<std::vec::Vec<u8>, StorageError>;

    /// Replace a whole record.
    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source for the runtime loops.  The controller itself
/// takes `now` as an argument so tests can drive time explicitly.
pub trait Clock {
    fn now(&self) -> Instant;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config file at the given path.
    NotFound,
    /// File exists but is not valid JSON for [`SystemConfig`].
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error reading the file.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested record does not exist.
    NotFound,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
