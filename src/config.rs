//! System configuration parameters
//!
//! All tunable parameters for the chiller controller.  Loaded once at
//! startup from a JSON file through the [`ConfigPort`](crate::app::ports::ConfigPort);
//! every field has a default, so a partial file only overrides what it names.

use std::path::PathBuf;

use embassy_time::Duration;
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::demand::DemandParams;
use crate::control::lockout::LockoutParams;
use crate::state::{MAX_SENSORS, SensorKey, sensor_key};

/// 1-Wire slave id, e.g. `28-0316a2794cff`.
pub type DeviceId = String<32>;

/// Maps a logical sensor key to its bus device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorBinding {
    pub key: SensorKey,
    pub device_id: DeviceId,
}

/// Relay output wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// BCM line number of the pump relay.
    pub pump_gpio: u32,
    /// BCM line number of the condenser relay.
    pub condenser_gpio: u32,
    /// `true` if a high level energises the relay coil.
    pub active_high: bool,
    /// Drive in-memory pins instead of sysfs GPIO.
    pub simulate: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pump_gpio: 17,
            condenser_gpio: 27,
            active_high: true,
            simulate: false,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Operational parameters ---
    /// Setpoint used when no setpoint record exists (°F)
    pub fallback_setpoint_f: f32,
    /// Differential used when no operational record exists (°F)
    pub initial_differential_f: f32,
    /// Ambient lockout setpoint used when no operational record exists (°F)
    pub initial_ambient_lockout_setpoint_f: f32,
    /// Width of the lockout release band above the lockout setpoint (°F)
    pub ambient_lockout_deadband_f: f32,
    /// How long ambient must hold past a threshold before the lockout moves
    pub ambient_lockout_debounce_secs: u32,
    /// Minimum time the condenser stays off after being turned off
    pub condenser_min_off_time_secs: u32,
    /// How long a remote call stays active after it was last received
    pub ahu_call_timeout_secs: u32,
    /// Pump run-on after a call ends
    pub pump_post_purge_secs: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Sensor poll interval (milliseconds)
    pub sensor_poll_interval_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
    /// Remote silence after which comms are considered lost (seconds)
    pub comms_failsafe_timeout_secs: u32,

    // --- Sensors ---
    pub sensors: Vec<SensorBinding, MAX_SENSORS>,
    /// Keys whose loss raises the critical sensor fault
    pub critical_sensors: Vec<SensorKey, MAX_SENSORS>,
    /// Key the condenser hysteresis runs against
    pub reference_sensor: SensorKey,
    /// Key feeding the ambient lockout
    pub ambient_sensor: SensorKey,
    /// Root of the 1-Wire sysfs tree
    pub w1_base_dir: PathBuf,

    // --- Outputs ---
    pub relays: RelayConfig,

    // --- Persistence / diagnostics ---
    /// Directory holding the setpoint, operational and override records
    pub state_dir: PathBuf,
    pub debug_logging: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let supply = sensor_key("supply").unwrap_or_default();
        let mut critical_sensors = Vec::new();
        // Capacity is MAX_SENSORS, one entry always fits.
        let _ = critical_sensors.push(supply.clone());

        Self {
            // Operational parameters
            fallback_setpoint_f: 45.0,
            initial_differential_f: 3.0,
            initial_ambient_lockout_setpoint_f: 50.0,
            ambient_lockout_deadband_f: 5.0,
            ambient_lockout_debounce_secs: 300,
            condenser_min_off_time_secs: 120,
            ahu_call_timeout_secs: 300,
            pump_post_purge_secs: 60,

            // Timing
            control_loop_interval_ms: 2000,
            sensor_poll_interval_ms: 5000,
            telemetry_interval_secs: 60,
            comms_failsafe_timeout_secs: 75,

            // Sensors
            sensors: Vec::new(),
            critical_sensors,
            reference_sensor: supply,
            ambient_sensor: sensor_key("ambient").unwrap_or_default(),
            w1_base_dir: PathBuf::from("/sys/bus/w1/devices"),

            relays: RelayConfig::default(),

            state_dir: PathBuf::from("/var/lib/chiller"),
            debug_logging: false,
        }
    }
}

impl SystemConfig {
    pub fn lockout_params(&self) -> LockoutParams {
        LockoutParams {
            deadband_f: self.ambient_lockout_deadband_f,
            debounce: Duration::from_secs(u64::from(self.ambient_lockout_debounce_secs)),
        }
    }

    pub fn demand_params(&self) -> DemandParams {
        DemandParams {
            call_timeout: Duration::from_secs(u64::from(self.ahu_call_timeout_secs)),
            post_purge: Duration::from_secs(u64::from(self.pump_post_purge_secs)),
        }
    }

    pub fn condenser_min_off(&self) -> Duration {
        Duration::from_secs(u64::from(self.condenser_min_off_time_secs))
    }

    pub fn comms_failsafe_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.comms_failsafe_timeout_secs))
    }
}

fn finite_in(v: f32, lo: f32, hi: f32) -> bool {
    v.is_finite() && (lo..=hi).contains(&v)
}

/// Range-check every field.  Rejects rather than clamps.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !finite_in(cfg.fallback_setpoint_f, 20.0, 90.0) {
        return Err(ConfigError::ValidationFailed(
            "fallback_setpoint_f must be 20.0–90.0",
        ));
    }
    if !finite_in(cfg.initial_differential_f, 0.1, 30.0) {
        return Err(ConfigError::ValidationFailed(
            "initial_differential_f must be 0.1–30.0",
        ));
    }
    if !finite_in(cfg.initial_ambient_lockout_setpoint_f, -40.0, 120.0) {
        return Err(ConfigError::ValidationFailed(
            "initial_ambient_lockout_setpoint_f must be -40.0–120.0",
        ));
    }
    if !finite_in(cfg.ambient_lockout_deadband_f, 0.0, 30.0) {
        return Err(ConfigError::ValidationFailed(
            "ambient_lockout_deadband_f must be 0.0–30.0",
        ));
    }
    if cfg.ambient_lockout_debounce_secs > 86_400 {
        return Err(ConfigError::ValidationFailed(
            "ambient_lockout_debounce_secs must be <= 86400",
        ));
    }
    if cfg.condenser_min_off_time_secs > 3600 {
        return Err(ConfigError::ValidationFailed(
            "condenser_min_off_time_secs must be <= 3600",
        ));
    }
    if !(1..=86_400).contains(&cfg.ahu_call_timeout_secs) {
        return Err(ConfigError::ValidationFailed(
            "ahu_call_timeout_secs must be 1–86400",
        ));
    }
    if cfg.pump_post_purge_secs > 3600 {
        return Err(ConfigError::ValidationFailed(
            "pump_post_purge_secs must be <= 3600",
        ));
    }
    if !(100..=10_000).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 100–10000",
        ));
    }
    if !(100..=60_000).contains(&cfg.sensor_poll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "sensor_poll_interval_ms must be 100–60000",
        ));
    }
    if !(5..=3600).contains(&cfg.telemetry_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "telemetry_interval_secs must be 5–3600",
        ));
    }
    if !(5..=86_400).contains(&cfg.comms_failsafe_timeout_secs) {
        return Err(ConfigError::ValidationFailed(
            "comms_failsafe_timeout_secs must be 5–86400",
        ));
    }
    if cfg.reference_sensor.is_empty() {
        return Err(ConfigError::ValidationFailed("reference_sensor must be set"));
    }
    if cfg.relays.pump_gpio == cfg.relays.condenser_gpio {
        return Err(ConfigError::ValidationFailed(
            "pump_gpio and condenser_gpio must differ",
        ));
    }
    for (i, binding) in cfg.sensors.iter().enumerate() {
        if cfg.sensors[..i].iter().any(|b| b.key == binding.key) {
            return Err(ConfigError::ValidationFailed("sensor keys must be unique"));
        }
    }
    Ok(())
}
