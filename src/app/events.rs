//! Outbound application events.
//!
//! The [`Controller`](super::service::Controller) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, forward them to the
//! supervisor link, or record them in tests.

use crate::state::{Relay, StateSnapshot};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Periodic or requested telemetry snapshot.
    Telemetry(Box<StateSnapshot>),

    /// A relay's commanded state changed.
    RelayChanged { relay: Relay, on: bool },

    /// The ambient lockout engaged (`true`) or released (`false`).
    AmbientLockoutChanged(bool),

    /// One or more safety faults were raised; carries the new bitmask.
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// The control loop has started.
    Started,

    /// Outputs were driven off and the control loop stopped.
    Stopped,
}
