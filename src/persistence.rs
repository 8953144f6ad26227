//! Persisted operating parameters.
//!
//! Three independent records, each a flat JSON document rewritten in full
//! whenever one of its fields changes:
//!
//! | key                  | fields                                        |
//! |----------------------|-----------------------------------------------|
//! | `setpoint`           | `setpoint_f`                                  |
//! | `operational_params` | `differential_f`, `ambient_lockout_setpoint_f` |
//! | `overrides`          | `pump`, `condenser`, `cooling_call`           |
//!
//! A missing or malformed record falls back to the configured default for
//! that record only.  The bad file is left untouched; it is replaced the
//! next time the operator changes one of its fields.  Every load reports a
//! [`RecordOrigin`] so telemetry can show which values were defaulted.
//!
//! The condenser override is session-only: it is always written as `auto`
//! and ignored on load, so a restart never resumes a forced compressor run.

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::state::{OverrideValue, Overrides};

pub const SETPOINT_KEY: &str = "setpoint";
pub const OPERATIONAL_KEY: &str = "operational_params";
pub const OVERRIDES_KEY: &str = "overrides";

/// Current on-disk layout version for all three records.
pub const RECORD_VERSION: u32 = 1;

fn current_version() -> u32 {
    RECORD_VERSION
}

// ---------------------------------------------------------------------------
// Record layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetpointRecord {
    #[serde(default = "current_version")]
    pub version: u32,
    pub setpoint_f: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationalRecord {
    #[serde(default = "current_version")]
    pub version: u32,
    pub differential_f: f32,
    pub ambient_lockout_setpoint_f: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridesRecord {
    #[serde(default = "current_version")]
    pub version: u32,
    pub pump: OverrideValue,
    #[serde(default)]
    pub condenser: OverrideValue,
    pub cooling_call: OverrideValue,
}

/// Operational parameters as loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationalParams {
    pub differential_f: f32,
    pub ambient_lockout_setpoint_f: f32,
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Why a record fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultReason {
    Missing,
    Malformed,
    Unreadable,
}

/// Where the in-memory value of a record came from at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    #[default]
    Restored,
    Defaulted(DefaultReason),
}

impl RecordOrigin {
    pub fn is_defaulted(self) -> bool {
        matches!(self, Self::Defaulted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordOrigins {
    pub setpoint: RecordOrigin,
    pub operational: RecordOrigin,
    pub overrides: RecordOrigin,
}

/// A loaded value with its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub origin: RecordOrigin,
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn read_record<T: DeserializeOwned>(
    storage: &impl StoragePort,
    key: &str,
) -> Result<T, DefaultReason> {
    let bytes = match storage.read(key) {
        Ok(b) => b,
        Err(StorageError::NotFound) => return Err(DefaultReason::Missing),
        Err(e) => {
            warn!("Persistence: reading '{}' failed: {}", key, e);
            return Err(DefaultReason::Unreadable);
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!("Persistence: '{}' is malformed: {}", key, e);
        DefaultReason::Malformed
    })
}

fn resolve<T: Copy + core::fmt::Debug>(
    key: &str,
    parsed: Result<T, DefaultReason>,
    default: T,
) -> Loaded<T> {
    match parsed {
        Ok(value) => {
            info!("Persistence: restored '{}' = {:?}", key, value);
            Loaded {
                value,
                origin: RecordOrigin::Restored,
            }
        }
        Err(reason) => {
            warn!(
                "Persistence: '{}' {:?}, using default {:?}",
                key, reason, default
            );
            Loaded {
                value: default,
                origin: RecordOrigin::Defaulted(reason),
            }
        }
    }
}

pub fn load_setpoint(storage: &impl StoragePort, fallback_f: f32) -> Loaded<f32> {
    let parsed = read_record::<SetpointRecord>(storage, SETPOINT_KEY).and_then(|r| {
        if r.version == RECORD_VERSION && r.setpoint_f.is_finite() {
            Ok(r.setpoint_f)
        } else {
            Err(DefaultReason::Malformed)
        }
    });
    resolve(SETPOINT_KEY, parsed, fallback_f)
}

pub fn load_operational(
    storage: &impl StoragePort,
    defaults: OperationalParams,
) -> Loaded<OperationalParams> {
    let parsed = read_record::<OperationalRecord>(storage, OPERATIONAL_KEY).and_then(|r| {
        let valid = r.version == RECORD_VERSION
            && r.differential_f.is_finite()
            && r.differential_f > 0.0
            && r.ambient_lockout_setpoint_f.is_finite();
        if valid {
            Ok(OperationalParams {
                differential_f: r.differential_f,
                ambient_lockout_setpoint_f: r.ambient_lockout_setpoint_f,
            })
        } else {
            Err(DefaultReason::Malformed)
        }
    });
    resolve(OPERATIONAL_KEY, parsed, defaults)
}

/// Load overrides.  The stored condenser value is ignored.
pub fn load_overrides(storage: &impl StoragePort) -> Loaded<Overrides> {
    let parsed = read_record::<OverridesRecord>(storage, OVERRIDES_KEY).and_then(|r| {
        if r.version == RECORD_VERSION {
            Ok(Overrides {
                pump: r.pump,
                condenser: OverrideValue::Auto,
                cooling_call: r.cooling_call,
            })
        } else {
            Err(DefaultReason::Malformed)
        }
    });
    resolve(OVERRIDES_KEY, parsed, Overrides::default())
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

fn write_record<T: Serialize>(
    storage: &impl StoragePort,
    key: &str,
    record: &T,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(record).map_err(|_| StorageError::IoError)?;
    storage.write(key, &bytes)
}

pub fn save_setpoint(storage: &impl StoragePort, setpoint_f: f32) -> Result<(), StorageError> {
    write_record(
        storage,
        SETPOINT_KEY,
        &SetpointRecord {
            version: RECORD_VERSION,
            setpoint_f,
        },
    )
}

pub fn save_operational(
    storage: &impl StoragePort,
    params: OperationalParams,
) -> Result<(), StorageError> {
    write_record(
        storage,
        OPERATIONAL_KEY,
        &OperationalRecord {
            version: RECORD_VERSION,
            differential_f: params.differential_f,
            ambient_lockout_setpoint_f: params.ambient_lockout_setpoint_f,
        },
    )
}

pub fn save_overrides(storage: &impl StoragePort, overrides: Overrides) -> Result<(), StorageError> {
    write_record(
        storage,
        OVERRIDES_KEY,
        &OverridesRecord {
            version: RECORD_VERSION,
            pump: overrides.pump,
            condenser: OverrideValue::Auto,
            cooling_call: overrides.cooling_call,
        },
    )
}
