//! Host time adapter.
//!
//! Provides monotonic time for the runtime loops.  Instants come from the
//! `embassy-time` std driver, so they share one timeline with every
//! `Instant` the controller stores.

use embassy_time::Instant;

use crate::app::ports::Clock;

/// Monotonic clock backed by the process uptime.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
