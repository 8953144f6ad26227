//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (stderr via `env_logger` in production).  A supervisor
//! link adapter would implement the same trait.

use core::fmt::Write as _;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::persistence::RecordOrigin;
use crate::state::StateSnapshot;

/// Adapter that logs every [`AppEvent`].
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

fn provenance(origin: RecordOrigin) -> &'static str {
    if origin.is_defaulted() { "default" } else { "stored" }
}

fn format_sensors(t: &StateSnapshot) -> String {
    let mut out = String::new();
    for s in &t.sensors {
        let _ = match s.value {
            Some(v) => write!(out, " {}={:.1}F", s.key, v),
            None => write!(out, " {}=--", s.key),
        };
    }
    out
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | sp={:.1}F diff={:.1}F lockout_sp={:.1}F |{} | \
                     pump={} ({:?}) cond={} ({:?}) | ovr pump={} cond={} call={} | \
                     call={} purge={:?}s lockout={} comms_lost={} | faults=0b{:08b} | \
                     records sp={} op={} ovr={}",
                    t.setpoint_f,
                    t.differential_f,
                    t.ambient_lockout_setpoint_f,
                    format_sensors(t),
                    on_off(t.relays.pump),
                    t.pump_reason,
                    on_off(t.relays.condenser),
                    t.condenser_reason,
                    t.overrides.pump,
                    t.overrides.condenser,
                    t.overrides.cooling_call,
                    t.ahu_call_active,
                    t.post_purge_remaining_secs,
                    t.ambient_lockout_active,
                    t.comms_lost,
                    t.fault_flags,
                    provenance(t.records.setpoint),
                    provenance(t.records.operational),
                    provenance(t.records.overrides),
                );
            }
            AppEvent::RelayChanged { relay, on } => {
                info!("RELAY | {} -> {}", relay, on_off(*on));
            }
            AppEvent::AmbientLockoutChanged(active) => {
                info!("LOCKOUT | {}", if *active { "engaged" } else { "released" });
            }
            AppEvent::FaultDetected(flags) => {
                warn!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::Started => {
                info!("START | control loop running");
            }
            AppEvent::Stopped => {
                info!("STOP | outputs off");
            }
        }
    }
}
