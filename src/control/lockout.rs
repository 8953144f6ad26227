//! Ambient-temperature lockout.
//!
//! Debounced hysteresis over the outdoor (ambient) reading.  While locked,
//! auto-mode cooling is held off entirely; manual overrides still work.
//!
//! ```text
//!            temp < setpoint for >= debounce
//!   Unlocked ───────────────────────────────▶ Locked
//!      ▲                                        │
//!      └────────────────────────────────────────┘
//!        temp > setpoint + deadband for >= debounce
//! ```
//!
//! Readings inside `[setpoint, setpoint + deadband]` reset both timers and
//! keep the current state.  The two timers live in one enum, so at most
//! one of them can be running.

use embassy_time::{Duration, Instant};

/// Fixed lockout tuning (from configuration).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockoutParams {
    pub deadband_f: f32,
    pub debounce: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Debounce {
    Idle,
    /// Ambient has been below the setpoint since this instant.
    Below(Instant),
    /// Ambient has been above the release threshold since this instant.
    Above(Instant),
}

/// Lockout sub-state-machine.  Starts unlocked and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbientLockout {
    active: bool,
    debounce: Debounce,
}

impl Default for AmbientLockout {
    fn default() -> Self {
        Self::new()
    }
}

impl AmbientLockout {
    pub const fn new() -> Self {
        Self {
            active: false,
            debounce: Debounce::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn below_since(&self) -> Option<Instant> {
        match self.debounce {
            Debounce::Below(t) => Some(t),
            _ => None,
        }
    }

    pub fn above_since(&self) -> Option<Instant> {
        match self.debounce {
            Debounce::Above(t) => Some(t),
            _ => None,
        }
    }

    /// Clear both debounce timers without changing state.
    pub fn reset_timers(&mut self) {
        self.debounce = Debounce::Idle;
    }

    /// Advance the machine with the current ambient reading.
    ///
    /// Returns `Some(new_state)` when the lockout engages or releases.
    pub fn evaluate(
        &mut self,
        ambient_f: Option<f32>,
        setpoint_f: f32,
        params: &LockoutParams,
        now: Instant,
    ) -> Option<bool> {
        let Some(temp) = ambient_f else {
            self.debounce = Debounce::Idle;
            return self.transition(false);
        };

        if temp < setpoint_f {
            let since = match self.debounce {
                Debounce::Below(t) => t,
                _ => now,
            };
            self.debounce = Debounce::Below(since);
            if !self.active && now.saturating_duration_since(since) >= params.debounce {
                return self.transition(true);
            }
        } else if temp > setpoint_f + params.deadband_f {
            let since = match self.debounce {
                Debounce::Above(t) => t,
                _ => now,
            };
            self.debounce = Debounce::Above(since);
            if self.active && now.saturating_duration_since(since) >= params.debounce {
                return self.transition(false);
            }
        } else {
            self.debounce = Debounce::Idle;
        }
        None
    }

    fn transition(&mut self, active: bool) -> Option<bool> {
        if self.active == active {
            return None;
        }
        self.active = active;
        Some(active)
    }
}
