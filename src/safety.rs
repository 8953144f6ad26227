//! Safety supervisor.
//!
//! The supervisor keeps a fault bitmask inside the shared control state.
//! Unlike an interlock that trips everything off, neither fault here stops
//! the control loop:
//!
//! - **Critical sensor**: any configured critical probe is invalid.  The
//!   decision engine holds the condenser off in auto mode while the bit is
//!   set.  Recomputed from current validity on every sensor batch, so it
//!   clears on its own the first time every critical probe reads again.
//! - **Comms lost**: no remote traffic for longer than the fail-safe
//!   window.  Reported through telemetry; control keeps running on cached
//!   values.  Cleared by the next sign of link activity.
//!
//! Set transitions log at `error!`, clear transitions at `info!`.

use embassy_time::{Duration, Instant};
use log::{error, info};

use crate::error::SafetyFault;
use crate::state::{SensorKey, SensorTable};

/// Safety supervisor.
#[derive(Debug, Clone, Default)]
pub struct SafetySupervisor {
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub const fn new() -> Self {
        Self { faults: 0 }
    }

    /// Recompute the critical-sensor fault from current validity.
    /// Returns `true` if the fault bit changed.
    pub fn evaluate_sensors(&mut self, sensors: &SensorTable, critical: &[SensorKey]) -> bool {
        let before = self.faults;
        let any_invalid = critical.iter().any(|key| !sensors.is_valid(key));
        self.eval_fault(SafetyFault::CriticalSensor, any_invalid);
        before != self.faults
    }

    /// Raise comms loss once the link has been silent for longer than
    /// `timeout`.  Returns `true` if the fault bit changed.
    pub fn evaluate_comms(&mut self, last_activity: Instant, now: Instant, timeout: Duration) -> bool {
        let before = self.faults;
        let silent = now.saturating_duration_since(last_activity) > timeout;
        self.eval_fault(SafetyFault::CommsLost, silent);
        before != self.faults
    }

    /// Link activity observed; drop the comms fault immediately.
    pub fn link_active(&mut self) {
        self.eval_fault(SafetyFault::CommsLost, false);
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
