//! Shared control state.
//!
//! `ControlState` is the single record every loop reads from and writes to:
//! setpoints, operator overrides, the latest temperature readings, the
//! commanded relay states, and the timers behind the lockout, demand and
//! minimum-off logic.  It is owned by the
//! [`Controller`](crate::app::service::Controller), which keeps it behind one
//! mutex and only mutates it through named operations.

use core::fmt;
use core::str::FromStr;

use embassy_time::Instant;
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::control::decision::{CondenserReason, PumpReason};
use crate::control::demand::DemandTracker;
use crate::control::lockout::AmbientLockout;
use crate::error::{CommandError, SafetyFault};
use crate::persistence::RecordOrigins;
use crate::safety::SafetySupervisor;

/// Maximum number of distinct sensor keys tracked.
pub const MAX_SENSORS: usize = 8;

/// Short logical sensor name ("supply", "return", "ambient", ...).
pub type SensorKey = String<16>;

/// Build a [`SensorKey`], rejecting names longer than its capacity.
pub fn sensor_key(name: &str) -> Option<SensorKey> {
    let mut key = SensorKey::new();
    key.push_str(name).ok()?;
    Some(key)
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Three-valued operator override.  `Auto` hands the output back to the
/// decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideValue {
    #[default]
    Auto,
    On,
    Off,
}

impl FromStr for OverrideValue {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "none" => Ok(Self::Auto),
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(CommandError::InvalidArgument),
        }
    }
}

impl fmt::Display for OverrideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// Targets an operator can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Pump,
    Condenser,
    CoolingCall,
}

impl FromStr for Device {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pump" => Ok(Self::Pump),
            "condenser" | "chiller" => Ok(Self::Condenser),
            "cooling" | "cooling_call" | "call" => Ok(Self::CoolingCall),
            _ => Err(CommandError::InvalidArgument),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pump => write!(f, "pump"),
            Self::Condenser => write!(f, "condenser"),
            Self::CoolingCall => write!(f, "cooling_call"),
        }
    }
}

/// Current override for every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Overrides {
    pub pump: OverrideValue,
    pub condenser: OverrideValue,
    pub cooling_call: OverrideValue,
}

impl Overrides {
    pub fn get(&self, device: Device) -> OverrideValue {
        match device {
            Device::Pump => self.pump,
            Device::Condenser => self.condenser,
            Device::CoolingCall => self.cooling_call,
        }
    }

    /// Store `value`; returns `true` if it differed from the held value.
    pub fn set(&mut self, device: Device, value: OverrideValue) -> bool {
        let slot = match device {
            Device::Pump => &mut self.pump,
            Device::Condenser => &mut self.condenser,
            Device::CoolingCall => &mut self.cooling_call,
        };
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }
}

// ---------------------------------------------------------------------------
// Relays
// ---------------------------------------------------------------------------

/// The two binary outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    Pump,
    Condenser,
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pump => write!(f, "pump"),
            Self::Condenser => write!(f, "condenser"),
        }
    }
}

/// Last commanded relay states (commanded, not verified).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RelayStates {
    pub pump: bool,
    pub condenser: bool,
}

// ---------------------------------------------------------------------------
// Sensor table
// ---------------------------------------------------------------------------

/// One cached reading.  `value == None` means the sensor is invalid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSample {
    pub key: SensorKey,
    pub value: Option<f32>,
}

/// Latest reading per sensor key.
#[derive(Debug, Clone, Default)]
pub struct SensorTable {
    samples: Vec<SensorSample, MAX_SENSORS>,
}

impl SensorTable {
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Store a reading.  Non-finite values are stored as invalid.
    /// Returns `false` if the key is new and the table is full.
    pub fn update(&mut self, key: &SensorKey, value: Option<f32>) -> bool {
        let value = value.filter(|v| v.is_finite());
        if let Some(sample) = self.samples.iter_mut().find(|s| s.key == *key) {
            sample.value = value;
            return true;
        }
        self.samples
            .push(SensorSample {
                key: key.clone(),
                value,
            })
            .is_ok()
    }

    /// Latest valid value for `key`.
    pub fn value(&self, key: &str) -> Option<f32> {
        self.samples
            .iter()
            .find(|s| s.key.as_str() == key)
            .and_then(|s| s.value)
    }

    /// A key that has never reported is invalid.
    pub fn is_valid(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    pub fn samples(&self) -> &[SensorSample] {
        &self.samples
    }
}

// ---------------------------------------------------------------------------
// ControlState
// ---------------------------------------------------------------------------

/// The shared record guarded by the controller's mutex.
pub struct ControlState {
    // -- Operator parameters (persisted) --
    pub setpoint_f: f32,
    pub differential_f: f32,
    pub ambient_lockout_setpoint_f: f32,
    pub overrides: Overrides,

    // -- Inputs --
    pub sensors: SensorTable,
    pub last_remote_message_at: Instant,

    // -- Outputs --
    /// Last commanded relay states.
    pub relays: RelayStates,
    /// Written only when the condenser goes from commanded on to off.
    pub condenser_last_off_at: Instant,

    // -- Derived sub-machines --
    pub demand: DemandTracker,
    pub lockout: AmbientLockout,
    pub safety: SafetySupervisor,

    // -- Diagnostics --
    pub last_reasons: Option<(PumpReason, CondenserReason)>,
    pub records: RecordOrigins,
    /// Fault mask and lockout state as last reported through events.
    pub reported_faults: u8,
    pub reported_lockout: bool,
}

impl ControlState {
    /// Startup state.  Both timers start at `now`, so the condenser
    /// observes a full minimum-off period after boot.
    pub fn new(
        setpoint_f: f32,
        differential_f: f32,
        ambient_lockout_setpoint_f: f32,
        overrides: Overrides,
        records: RecordOrigins,
        now: Instant,
    ) -> Self {
        Self {
            setpoint_f,
            differential_f,
            ambient_lockout_setpoint_f,
            overrides,
            sensors: SensorTable::new(),
            last_remote_message_at: now,
            relays: RelayStates::default(),
            condenser_last_off_at: now,
            demand: DemandTracker::new(),
            lockout: AmbientLockout::new(),
            safety: SafetySupervisor::new(),
            last_reasons: None,
            records,
            reported_faults: 0,
            reported_lockout: false,
        }
    }

    pub fn critical_sensor_fault(&self) -> bool {
        self.safety.has_fault(SafetyFault::CriticalSensor)
    }

    pub fn comms_lost(&self) -> bool {
        self.safety.has_fault(SafetyFault::CommsLost)
    }

    /// Consistent copy of everything an operator or telemetry consumer
    /// needs, with timers rendered relative to `now`.
    pub fn snapshot(&self, now: Instant) -> StateSnapshot {
        let (pump_reason, condenser_reason) = match self.last_reasons {
            Some((p, c)) => (Some(p), Some(c)),
            None => (None, None),
        };
        StateSnapshot {
            setpoint_f: self.setpoint_f,
            differential_f: self.differential_f,
            ambient_lockout_setpoint_f: self.ambient_lockout_setpoint_f,
            overrides: self.overrides,
            sensors: self.sensors.samples.clone(),
            relays: self.relays,
            critical_sensor_fault: self.critical_sensor_fault(),
            ambient_lockout_active: self.lockout.is_active(),
            comms_lost: self.comms_lost(),
            ahu_call_active: self.demand.call_active(),
            post_purge_remaining_secs: self
                .demand
                .purge_end_at()
                .filter(|end| now < *end)
                .map(|end| end.saturating_duration_since(now).as_secs()),
            condenser_off_for_secs: if self.relays.condenser {
                None
            } else {
                Some(now.saturating_duration_since(self.condenser_last_off_at).as_secs())
            },
            fault_flags: self.safety.faults(),
            pump_reason,
            condenser_reason,
            records: self.records,
        }
    }
}

/// Point-in-time copy of [`ControlState`], suitable for logging or
/// transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub setpoint_f: f32,
    pub differential_f: f32,
    pub ambient_lockout_setpoint_f: f32,
    pub overrides: Overrides,
    pub sensors: Vec<SensorSample, MAX_SENSORS>,
    pub relays: RelayStates,
    pub critical_sensor_fault: bool,
    pub ambient_lockout_active: bool,
    pub comms_lost: bool,
    pub ahu_call_active: bool,
    pub post_purge_remaining_secs: Option<u64>,
    /// Seconds since the condenser was last commanded off; `None` while on.
    pub condenser_off_for_secs: Option<u64>,
    pub fault_flags: u8,
    pub pump_reason: Option<PumpReason>,
    pub condenser_reason: Option<CondenserReason>,
    pub records: RecordOrigins,
}

impl StateSnapshot {
    pub fn sensor(&self, key: &str) -> Option<f32> {
        self.sensors
            .iter()
            .find(|s| s.key.as_str() == key)
            .and_then(|s| s.value)
    }
}
