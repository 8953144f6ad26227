//! Per-tick pump / condenser decision.
//!
//! [`decide`] is a pure function of a state snapshot and the current
//! instant.  The controller applies the result, writes the relay cache and
//! re-arms the condenser minimum-off timer on the on→off edge.
//!
//! Pump priority:
//! 1. override on / off (clears any post-purge)
//! 2. ambient lockout → off
//! 3. demand tracker
//!
//! Condenser priority:
//! 1. pump off → off, whatever else is requested
//! 2. override on / off (bypasses the lockout)
//! 3. lockout, critical sensor fault, missing reference → off
//! 4. hysteresis against the last commanded state, gated by minimum-off

use embassy_time::{Duration, Instant};
use serde::Serialize;

use crate::state::{OverrideValue, Overrides};

/// Everything the decision reads, copied out of the shared state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionInputs {
    pub overrides: Overrides,
    pub lockout_active: bool,
    pub critical_sensor_fault: bool,
    /// Reference (supply) temperature, `None` if the probe is invalid.
    pub reference_f: Option<f32>,
    pub setpoint_f: f32,
    pub differential_f: f32,
    /// Pump demand from the demand tracker.
    pub demand: bool,
    /// Condenser state as last commanded.
    pub condenser_commanded: bool,
    pub condenser_last_off_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpReason {
    ManualOn,
    ManualOff,
    AmbientLockout,
    Demand,
    NoDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CondenserReason {
    PumpOff,
    ManualOn,
    ManualOff,
    AmbientLockout,
    CriticalSensorFault,
    NoReference,
    /// Was on, still above setpoint.
    Running,
    /// Was on, reached setpoint.
    SetpointReached,
    /// Was off, still below the turn-on threshold.
    Satisfied,
    /// Was off, above threshold, minimum-off time not yet elapsed.
    MinOffPending,
    /// Was off, above threshold and minimum-off satisfied.
    Started,
}

impl PumpReason {
    /// True for reasons that come from an operator rather than auto logic.
    pub fn is_manual(self) -> bool {
        matches!(self, Self::ManualOn | Self::ManualOff)
    }
}

impl CondenserReason {
    pub fn is_manual(self) -> bool {
        matches!(self, Self::ManualOn | Self::ManualOff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub pump_on: bool,
    pub condenser_on: bool,
    pub pump_reason: PumpReason,
    pub condenser_reason: CondenserReason,
}

impl Decision {
    /// A manual pump override clears any running post-purge.
    pub fn clears_purge(&self) -> bool {
        self.pump_reason.is_manual()
    }
}

/// Decide both outputs for this tick.
pub fn decide(inputs: &DecisionInputs, min_off: Duration, now: Instant) -> Decision {
    let (pump_on, pump_reason) = decide_pump(inputs);
    let (condenser_on, condenser_reason) = decide_condenser(inputs, pump_on, min_off, now);
    Decision {
        pump_on,
        condenser_on,
        pump_reason,
        condenser_reason,
    }
}

fn decide_pump(inputs: &DecisionInputs) -> (bool, PumpReason) {
    match inputs.overrides.pump {
        OverrideValue::On => (true, PumpReason::ManualOn),
        OverrideValue::Off => (false, PumpReason::ManualOff),
        OverrideValue::Auto if inputs.lockout_active => (false, PumpReason::AmbientLockout),
        OverrideValue::Auto if inputs.demand => (true, PumpReason::Demand),
        OverrideValue::Auto => (false, PumpReason::NoDemand),
    }
}

fn decide_condenser(
    inputs: &DecisionInputs,
    pump_on: bool,
    min_off: Duration,
    now: Instant,
) -> (bool, CondenserReason) {
    if !pump_on {
        return (false, CondenserReason::PumpOff);
    }
    match inputs.overrides.condenser {
        OverrideValue::On => return (true, CondenserReason::ManualOn),
        OverrideValue::Off => return (false, CondenserReason::ManualOff),
        OverrideValue::Auto => {}
    }
    if inputs.lockout_active {
        return (false, CondenserReason::AmbientLockout);
    }
    if inputs.critical_sensor_fault {
        return (false, CondenserReason::CriticalSensorFault);
    }
    let Some(temp) = inputs.reference_f else {
        return (false, CondenserReason::NoReference);
    };

    if inputs.condenser_commanded {
        if temp <= inputs.setpoint_f {
            (false, CondenserReason::SetpointReached)
        } else {
            (true, CondenserReason::Running)
        }
    } else if temp >= inputs.setpoint_f + inputs.differential_f {
        if now.saturating_duration_since(inputs.condenser_last_off_at) >= min_off {
            (true, CondenserReason::Started)
        } else {
            (false, CondenserReason::MinOffPending)
        }
    } else {
        (false, CondenserReason::Satisfied)
    }
}
