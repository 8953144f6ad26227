//! Controller: the hexagonal core.
//!
//! [`Controller`] owns the shared [`ControlState`] behind a single
//! critical-section mutex and exposes every mutation as a named operation.
//! All operations take `&self` and an explicit `now`, so the sensing loop,
//! the control loop, the telemetry loop and the remote command thread can
//! share one `Arc<Controller>` and tests can drive time directly.
//!
//! ```text
//!  sensing ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  remote  ──▶ │          Controller           │
//!              │ state · lockout · demand ·    │ ──▶ StoragePort
//! ActuatorPort◀│ safety · decision             │
//!              └──────────────────────────────┘
//! ```
//!
//! Relay writes and event emission happen outside the lock; persistence
//! writes happen inside it so records are written in the order the values
//! changed.  A record write therefore holds every loop for one storage
//! sync.  Records are only written when an operator value actually changes.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant};
use heapless::Vec;
use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::control::decision::{Decision, DecisionInputs, decide};
use crate::control::demand::{CallSource, DemandParams};
use crate::control::lockout::LockoutParams;
use crate::error::CommandError;
use crate::persistence::{self, OperationalParams, RecordOrigins};
use crate::state::{
    ControlState, Device, MAX_SENSORS, OverrideValue, Relay, RelayStates, SensorKey,
    StateSnapshot,
};

use super::commands::RemoteCommand;
use super::events::AppEvent;
use super::ports::{ActuatorPort, EventSink, StorageError, StoragePort};

// ───────────────────────────────────────────────────────────────
// Settings
// ───────────────────────────────────────────────────────────────

/// Immutable tuning extracted from [`SystemConfig`] at construction.
#[derive(Debug, Clone)]
struct Settings {
    lockout: LockoutParams,
    demand: DemandParams,
    min_off: Duration,
    comms_timeout: Duration,
    critical: Vec<SensorKey, MAX_SENSORS>,
    reference: SensorKey,
    ambient: SensorKey,
}

impl Settings {
    fn from_config(config: &SystemConfig) -> Self {
        Self {
            lockout: config.lockout_params(),
            demand: config.demand_params(),
            min_off: config.condenser_min_off(),
            comms_timeout: config.comms_failsafe_timeout(),
            critical: config.critical_sensors.clone(),
            reference: config.reference_sensor.clone(),
            ambient: config.ambient_sensor.clone(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller<S: StoragePort> {
    settings: Settings,
    storage: S,
    state: Mutex<CriticalSectionRawMutex, RefCell<ControlState>>,
    telemetry_requested: AtomicBool,
}

impl<S: StoragePort> Controller<S> {
    /// Restore persisted parameters (or defaults) and build the initial
    /// state.  Both outputs start commanded off.
    pub fn new(config: &SystemConfig, storage: S, now: Instant) -> Self {
        let settings = Settings::from_config(config);

        let setpoint = persistence::load_setpoint(&storage, config.fallback_setpoint_f);
        let operational = persistence::load_operational(
            &storage,
            OperationalParams {
                differential_f: config.initial_differential_f,
                ambient_lockout_setpoint_f: config.initial_ambient_lockout_setpoint_f,
            },
        );
        let overrides = persistence::load_overrides(&storage);
        let records = RecordOrigins {
            setpoint: setpoint.origin,
            operational: operational.origin,
            overrides: overrides.origin,
        };

        let mut state = ControlState::new(
            setpoint.value,
            operational.value.differential_f,
            operational.value.ambient_lockout_setpoint_f,
            overrides.value,
            records,
            now,
        );
        // Nothing has been read yet; critical probes start invalid.
        state
            .safety
            .evaluate_sensors(&state.sensors, &settings.critical);
        state.reported_faults = state.safety.faults();

        info!(
            "Controller: setpoint={:.1}F differential={:.1}F lockout={:.1}F overrides={:?}",
            state.setpoint_f, state.differential_f, state.ambient_lockout_setpoint_f, state.overrides
        );

        Self {
            settings,
            storage,
            state: Mutex::new(RefCell::new(state)),
            telemetry_requested: AtomicBool::new(false),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ControlState) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started);
        info!("Controller started");
    }

    /// Drive both outputs off (condenser first) and drop all demand.
    pub fn shutdown(&self, now: Instant, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        let prev = self.with_state(|st| {
            let prev = st.relays;
            if prev.condenser {
                st.condenser_last_off_at = now;
            }
            st.relays = RelayStates::default();
            st.demand.reset();
            prev
        });

        if prev.condenser {
            self.apply_relay(hw, sink, Relay::Condenser, false);
        }
        if prev.pump {
            self.apply_relay(hw, sink, Relay::Pump, false);
        }
        hw.all_off();
        sink.emit(&AppEvent::Stopped);
        info!("Controller stopped, outputs off");
    }

    // ── Sensor input ──────────────────────────────────────────

    /// Store a batch of readings, recompute the critical-sensor fault and,
    /// when the ambient probe reported or the fault changed, re-run the
    /// ambient lockout.
    pub fn submit_temperature_batch(&self, batch: &[(SensorKey, Option<f32>)], now: Instant) {
        self.with_state(|st| {
            for (key, value) in batch {
                if !st.sensors.update(key, *value) {
                    warn!("Sensors: table full, dropping reading for '{}'", key);
                }
            }
            let fault_changed = st
                .safety
                .evaluate_sensors(&st.sensors, &self.settings.critical);
            let ambient_reported = batch.iter().any(|(k, _)| *k == self.settings.ambient);
            if ambient_reported || fault_changed {
                self.evaluate_lockout(st, now);
            }
        });
    }

    fn evaluate_lockout(&self, st: &mut ControlState, now: Instant) {
        let ambient = st.sensors.value(&self.settings.ambient);
        let setpoint = st.ambient_lockout_setpoint_f;
        match st.lockout.evaluate(ambient, setpoint, &self.settings.lockout, now) {
            Some(true) => info!(
                "Ambient lockout ENGAGED: ambient {:?}F below {:.1}F",
                ambient, setpoint
            ),
            Some(false) => info!("Ambient lockout RELEASED: ambient {:?}F", ambient),
            None => {}
        }
    }

    // ── Operator parameters ───────────────────────────────────

    /// Returns `Ok(true)` if the value changed.
    #[allow(clippy::float_cmp)]
    pub fn set_setpoint(&self, value: f32) -> Result<bool, CommandError> {
        if !value.is_finite() {
            return Err(CommandError::NonFiniteValue);
        }
        Ok(self.with_state(|st| {
            if st.setpoint_f == value {
                return false;
            }
            st.setpoint_f = value;
            info!("Setpoint updated to {:.1}F", value);
            self.persist("setpoint", persistence::save_setpoint(&self.storage, value));
            true
        }))
    }

    #[allow(clippy::float_cmp)]
    pub fn set_differential(&self, value: f32) -> Result<bool, CommandError> {
        if !value.is_finite() {
            return Err(CommandError::NonFiniteValue);
        }
        if value <= 0.0 {
            return Err(CommandError::NonPositiveDifferential);
        }
        Ok(self.with_state(|st| {
            if st.differential_f == value {
                return false;
            }
            st.differential_f = value;
            info!("Differential updated to {:.1}F", value);
            self.persist("operational params", self.save_operational(st));
            true
        }))
    }

    /// Changing the lockout setpoint restarts the debounce and re-evaluates
    /// against the current ambient reading straight away.
    #[allow(clippy::float_cmp)]
    pub fn set_ambient_lockout_setpoint(&self, value: f32, now: Instant) -> Result<bool, CommandError> {
        if !value.is_finite() {
            return Err(CommandError::NonFiniteValue);
        }
        Ok(self.with_state(|st| {
            if st.ambient_lockout_setpoint_f == value {
                return false;
            }
            st.ambient_lockout_setpoint_f = value;
            info!("Ambient lockout setpoint updated to {:.1}F", value);
            self.persist("operational params", self.save_operational(st));
            st.lockout.reset_timers();
            self.evaluate_lockout(st, now);
            true
        }))
    }

    /// Returns `true` if the override changed.  Setting the cooling-call
    /// override on counts as an explicit call.
    pub fn set_override(&self, device: Device, value: OverrideValue, now: Instant) -> bool {
        self.with_state(|st| {
            if !st.overrides.set(device, value) {
                return false;
            }
            info!("Override {} = {}", device, value);
            if device == Device::CoolingCall && value == OverrideValue::On {
                st.demand.record_call(CallSource::CoolingOverride, now);
            }
            // The condenser override is session-only; its record field never changes.
            if device != Device::Condenser {
                self.persist("overrides", persistence::save_overrides(&self.storage, st.overrides));
            }
            true
        })
    }

    // ── Remote link ───────────────────────────────────────────

    /// The air handler is calling for cooling.
    pub fn signal_remote_call(&self, now: Instant) {
        self.with_state(|st| st.demand.record_call(CallSource::Remote, now));
        debug!("Remote cooling call received");
    }

    /// Any traffic from the supervisor resets the comms fail-safe.
    pub fn notify_remote_link_activity(&self, now: Instant) {
        self.with_state(|st| {
            st.last_remote_message_at = now;
            st.safety.link_active();
        });
    }

    pub fn request_telemetry(&self) {
        self.telemetry_requested.store(true, Ordering::Release);
    }

    /// Consume a pending telemetry request.
    pub fn take_telemetry_request(&self) -> bool {
        self.telemetry_requested.swap(false, Ordering::AcqRel)
    }

    /// Dispatch a parsed command.
    pub fn handle_command(&self, cmd: RemoteCommand, now: Instant) -> Result<(), CommandError> {
        match cmd {
            RemoteCommand::SetSetpoint(v) => self.set_setpoint(v).map(|_| ()),
            RemoteCommand::SetDifferential(v) => self.set_differential(v).map(|_| ()),
            RemoteCommand::SetAmbientLockoutSetpoint(v) => {
                self.set_ambient_lockout_setpoint(v, now).map(|_| ())
            }
            RemoteCommand::SetOverride(device, value) => {
                self.set_override(device, value, now);
                Ok(())
            }
            RemoteCommand::RemoteCall => {
                self.signal_remote_call(now);
                Ok(())
            }
            RemoteCommand::RefreshTelemetry => {
                self.request_telemetry();
                Ok(())
            }
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: comms check → demand → decision → relays.
    ///
    /// Relays are written only where the decision differs from the cached
    /// command.  Condenser-off goes out before pump-off, pump-on before
    /// condenser-on.
    pub fn tick(
        &self,
        now: Instant,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Decision {
        let (decision, prev, faults_edge, lockout_edge) = self.with_state(|st| {
            st.safety
                .evaluate_comms(st.last_remote_message_at, now, self.settings.comms_timeout);

            let demand = st
                .demand
                .evaluate(st.overrides.cooling_call, &self.settings.demand, now);
            let inputs = DecisionInputs {
                overrides: st.overrides,
                lockout_active: st.lockout.is_active(),
                critical_sensor_fault: st.critical_sensor_fault(),
                reference_f: st.sensors.value(&self.settings.reference),
                setpoint_f: st.setpoint_f,
                differential_f: st.differential_f,
                demand,
                condenser_commanded: st.relays.condenser,
                condenser_last_off_at: st.condenser_last_off_at,
            };
            let decision = decide(&inputs, self.settings.min_off, now);

            if decision.clears_purge() {
                st.demand.cancel_purge();
            }
            let prev = st.relays;
            if prev.condenser && !decision.condenser_on {
                st.condenser_last_off_at = now;
            }
            st.relays = RelayStates {
                pump: decision.pump_on,
                condenser: decision.condenser_on,
            };

            let reasons = (decision.pump_reason, decision.condenser_reason);
            if st.last_reasons != Some(reasons) {
                debug!(
                    "Decision: pump={} ({:?}) condenser={} ({:?}) ref={:?}F",
                    decision.pump_on,
                    decision.pump_reason,
                    decision.condenser_on,
                    decision.condenser_reason,
                    inputs.reference_f
                );
                st.last_reasons = Some(reasons);
            }

            let faults = st.safety.faults();
            let faults_edge = (faults != st.reported_faults).then_some(faults);
            st.reported_faults = faults;
            let lockout = st.lockout.is_active();
            let lockout_edge = (lockout != st.reported_lockout).then_some(lockout);
            st.reported_lockout = lockout;

            (decision, prev, faults_edge, lockout_edge)
        });

        if prev.condenser && !decision.condenser_on {
            self.apply_relay(hw, sink, Relay::Condenser, false);
        }
        if prev.pump != decision.pump_on {
            self.apply_relay(hw, sink, Relay::Pump, decision.pump_on);
        }
        if !prev.condenser && decision.condenser_on {
            self.apply_relay(hw, sink, Relay::Condenser, true);
        }

        if let Some(active) = lockout_edge {
            sink.emit(&AppEvent::AmbientLockoutChanged(active));
        }
        match faults_edge {
            Some(0) => sink.emit(&AppEvent::FaultCleared),
            Some(flags) => sink.emit(&AppEvent::FaultDetected(flags)),
            None => {}
        }

        decision
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self, now: Instant) -> StateSnapshot {
        self.with_state(|st| st.snapshot(now))
    }

    pub fn publish_telemetry(&self, now: Instant, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Telemetry(Box::new(self.snapshot(now))));
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_relay(&self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink, relay: Relay, on: bool) {
        info!("Relay {} commanded {}", relay, if on { "ON" } else { "OFF" });
        if let Err(e) = hw.set_relay(relay, on) {
            warn!("Relay {} write failed: {}", relay, e);
        }
        sink.emit(&AppEvent::RelayChanged { relay, on });
    }

    fn save_operational(&self, st: &ControlState) -> Result<(), StorageError> {
        persistence::save_operational(
            &self.storage,
            OperationalParams {
                differential_f: st.differential_f,
                ambient_lockout_setpoint_f: st.ambient_lockout_setpoint_f,
            },
        )
    }

    fn persist(&self, what: &str, result: Result<(), StorageError>) {
        if let Err(e) = result {
            warn!("Persisting {} failed ({}), keeping in-memory value", what, e);
        }
    }
}
