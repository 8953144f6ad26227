//! Cooling-demand tracker with pump post-purge.
//!
//! Turns transient call signals (a remote air-handler call, or the
//! cooling-call override held on) into a steady pump demand.  A call stays
//! signaled for `call_timeout` after it was last seen.  When the signal
//! drops, the pump keeps running for `post_purge` so the coil is flushed
//! before it stops.

use embassy_time::{Duration, Instant};
use log::debug;

use crate::state::OverrideValue;

/// Fixed demand tuning (from configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemandParams {
    pub call_timeout: Duration,
    pub post_purge: Duration,
}

/// Where an explicit call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSource {
    Remote,
    CoolingOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DemandTracker {
    last_call_at: Option<Instant>,
    last_remote_call_at: Option<Instant>,
    call_active: bool,
    purge_end_at: Option<Instant>,
}

impl DemandTracker {
    pub const fn new() -> Self {
        Self {
            last_call_at: None,
            last_remote_call_at: None,
            call_active: false,
            purge_end_at: None,
        }
    }

    /// An explicit call marks the call active, refreshes the timeout and
    /// cancels any purge.
    pub fn record_call(&mut self, source: CallSource, now: Instant) {
        self.last_call_at = Some(now);
        self.call_active = true;
        if source == CallSource::Remote {
            self.last_remote_call_at = Some(now);
        }
        self.purge_end_at = None;
    }

    pub fn cancel_purge(&mut self) {
        self.purge_end_at = None;
    }

    /// Drop every trace of demand (used on shutdown).
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Is a call currently signaled, ignoring the stored flag?
    pub fn is_signaled(&self, cooling: OverrideValue, params: &DemandParams, now: Instant) -> bool {
        let recent = self
            .last_call_at
            .is_some_and(|at| now.saturating_duration_since(at) < params.call_timeout);
        recent || cooling == OverrideValue::On
    }

    /// Update the debounced call flag and return the pump demand.
    ///
    /// A falling edge of the signal starts the post-purge window.
    pub fn evaluate(&mut self, cooling: OverrideValue, params: &DemandParams, now: Instant) -> bool {
        let signaled = self.is_signaled(cooling, params, now);
        if signaled != self.call_active {
            if signaled {
                debug!("Demand: call active");
            } else {
                let end = now + params.post_purge;
                debug!("Demand: call ended, post-purge for {}s", params.post_purge.as_secs());
                self.purge_end_at = Some(end);
            }
            self.call_active = signaled;
        }
        self.call_active || self.purge_active(now)
    }

    pub fn purge_active(&self, now: Instant) -> bool {
        self.purge_end_at.is_some_and(|end| now < end)
    }

    pub fn call_active(&self) -> bool {
        self.call_active
    }

    pub fn purge_end_at(&self) -> Option<Instant> {
        self.purge_end_at
    }

    pub fn last_call_at(&self) -> Option<Instant> {
        self.last_call_at
    }

    pub fn last_remote_call_at(&self) -> Option<Instant> {
        self.last_remote_call_at
    }
}
