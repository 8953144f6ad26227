//! Controller behaviour against mock relays, storage and event sink.

use chiller::app::commands::RemoteCommand;
use chiller::app::events::AppEvent;
use chiller::app::service::Controller;
use chiller::control::decision::{CondenserReason, PumpReason};
use chiller::error::{CommandError, SafetyFault};
use chiller::persistence::{OVERRIDES_KEY, SETPOINT_KEY};
use chiller::state::{Device, OverrideValue, Relay};

use crate::mock_hw::{
    ActuatorCall, MemStorage, MockRelays, RecordingSink, controller, feed, t, test_config,
};

/// Tick with the remote link kept alive, so comms loss stays out of the way.
fn live_tick(
    ctl: &Controller<MemStorage>,
    secs: u64,
    hw: &mut MockRelays,
    sink: &mut RecordingSink,
) -> chiller::control::decision::Decision {
    ctl.notify_remote_link_activity(t(secs));
    ctl.tick(t(secs), hw, sink)
}

// ── Outputs ───────────────────────────────────────────────────

#[test]
fn idle_controller_writes_nothing() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();

    let d = live_tick(&ctl, 5, &mut hw, &mut sink);
    assert!(!d.pump_on);
    assert!(!d.condenser_on);
    assert_eq!(d.pump_reason, PumpReason::NoDemand);
    assert_eq!(d.condenser_reason, CondenserReason::PumpOff);
    assert!(hw.calls.is_empty());
}

#[test]
fn condenser_waits_out_minimum_off_after_boot() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::Pump, OverrideValue::On, t(0));
    feed(&ctl, "supply", Some(49.0), t(1));

    let d = live_tick(&ctl, 10, &mut hw, &mut sink);
    assert!(d.pump_on);
    assert_eq!(d.condenser_reason, CondenserReason::MinOffPending);

    let d = live_tick(&ctl, 119, &mut hw, &mut sink);
    assert!(!d.condenser_on);

    let d = live_tick(&ctl, 120, &mut hw, &mut sink);
    assert!(d.condenser_on);
    assert_eq!(d.condenser_reason, CondenserReason::Started);
    assert_eq!(
        hw.set_calls(),
        vec![(Relay::Pump, true), (Relay::Condenser, true)]
    );
}

#[test]
fn pump_on_precedes_condenser_on_in_one_tick() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::Pump, OverrideValue::On, t(0));
    feed(&ctl, "supply", Some(50.0), t(0));

    live_tick(&ctl, 200, &mut hw, &mut sink);
    assert_eq!(
        hw.set_calls(),
        vec![(Relay::Pump, true), (Relay::Condenser, true)]
    );
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::RelayChanged { .. })),
        2
    );
}

#[test]
fn condenser_off_precedes_pump_off() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::Pump, OverrideValue::On, t(0));
    feed(&ctl, "supply", Some(50.0), t(0));
    live_tick(&ctl, 200, &mut hw, &mut sink);
    hw.clear();

    ctl.set_override(Device::Pump, OverrideValue::Off, t(210));
    let d = live_tick(&ctl, 210, &mut hw, &mut sink);
    assert_eq!(d.pump_reason, PumpReason::ManualOff);
    assert_eq!(d.condenser_reason, CondenserReason::PumpOff);
    assert_eq!(
        hw.set_calls(),
        vec![(Relay::Condenser, false), (Relay::Pump, false)]
    );
    assert_eq!(ctl.snapshot(t(215)).condenser_off_for_secs, Some(5));
}

#[test]
fn condenser_override_cannot_run_without_pump() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::Condenser, OverrideValue::On, t(0));
    feed(&ctl, "supply", Some(60.0), t(0));

    let d = live_tick(&ctl, 300, &mut hw, &mut sink);
    assert!(!d.condenser_on);
    assert_eq!(d.condenser_reason, CondenserReason::PumpOff);
    assert!(hw.calls.is_empty());
}

#[test]
fn critical_sensor_fault_blocks_condenser_and_clears() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::Pump, OverrideValue::On, t(0));

    let d = live_tick(&ctl, 200, &mut hw, &mut sink);
    assert!(d.pump_on);
    assert_eq!(d.condenser_reason, CondenserReason::CriticalSensorFault);
    assert!(ctl.snapshot(t(200)).critical_sensor_fault);

    feed(&ctl, "supply", Some(50.0), t(201));
    let d = live_tick(&ctl, 202, &mut hw, &mut sink);
    assert!(d.condenser_on);
    assert_eq!(sink.count(|e| *e == AppEvent::FaultCleared), 1);

    feed(&ctl, "supply", None, t(203));
    let d = live_tick(&ctl, 204, &mut hw, &mut sink);
    assert!(!d.condenser_on);
    assert_eq!(
        sink.count(|e| *e == AppEvent::FaultDetected(SafetyFault::CriticalSensor.mask())),
        1
    );
}

#[test]
fn relay_write_failure_keeps_commanded_state() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays {
        fail_relay: Some(Relay::Pump),
        ..MockRelays::default()
    };
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::Pump, OverrideValue::On, t(0));

    live_tick(&ctl, 1, &mut hw, &mut sink);
    live_tick(&ctl, 2, &mut hw, &mut sink);
    assert!(ctl.snapshot(t(2)).relays.pump);
    // Only the edge is written; no retry storm on a failing line.
    assert_eq!(hw.set_calls(), vec![(Relay::Pump, true)]);
    assert_eq!(
        sink.count(|e| *e == AppEvent::RelayChanged { relay: Relay::Pump, on: true }),
        1
    );
}

// ── Demand ────────────────────────────────────────────────────

#[test]
fn manual_pump_override_cancels_post_purge() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.signal_remote_call(t(0));

    live_tick(&ctl, 300, &mut hw, &mut sink);
    assert_eq!(ctl.snapshot(t(300)).post_purge_remaining_secs, Some(60));

    ctl.set_override(Device::Pump, OverrideValue::On, t(310));
    live_tick(&ctl, 310, &mut hw, &mut sink);
    assert_eq!(ctl.snapshot(t(310)).post_purge_remaining_secs, None);

    ctl.set_override(Device::Pump, OverrideValue::Auto, t(320));
    let d = live_tick(&ctl, 320, &mut hw, &mut sink);
    assert!(!d.pump_on);
    assert_eq!(d.pump_reason, PumpReason::NoDemand);
}

#[test]
fn cooling_call_override_counts_as_demand() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::CoolingCall, OverrideValue::On, t(0));

    let d = live_tick(&ctl, 1000, &mut hw, &mut sink);
    assert!(d.pump_on);
    assert_eq!(d.pump_reason, PumpReason::Demand);
    assert!(ctl.snapshot(t(1000)).ahu_call_active);
}

// ── Ambient lockout ───────────────────────────────────────────

#[test]
fn lockout_stops_auto_pump_but_not_overrides() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.set_override(Device::CoolingCall, OverrideValue::On, t(0));
    feed(&ctl, "supply", Some(55.0), t(0));
    feed(&ctl, "ambient", Some(40.0), t(0));
    feed(&ctl, "ambient", Some(40.0), t(300));

    let d = live_tick(&ctl, 300, &mut hw, &mut sink);
    assert!(!d.pump_on);
    assert_eq!(d.pump_reason, PumpReason::AmbientLockout);
    assert_eq!(sink.count(|e| *e == AppEvent::AmbientLockoutChanged(true)), 1);

    ctl.set_override(Device::Pump, OverrideValue::On, t(301));
    let d = live_tick(&ctl, 301, &mut hw, &mut sink);
    assert!(d.pump_on);
    assert_eq!(d.condenser_reason, CondenserReason::AmbientLockout);

    ctl.set_override(Device::Condenser, OverrideValue::On, t(302));
    let d = live_tick(&ctl, 302, &mut hw, &mut sink);
    assert!(d.condenser_on);
    assert_eq!(d.condenser_reason, CondenserReason::ManualOn);
}

#[test]
fn lockout_setpoint_change_restarts_debounce() {
    let ctl = controller(MemStorage::new());
    feed(&ctl, "ambient", Some(40.0), t(0));
    feed(&ctl, "ambient", Some(40.0), t(300));
    assert!(ctl.snapshot(t(300)).ambient_lockout_active);

    assert_eq!(ctl.set_ambient_lockout_setpoint(30.0, t(310)), Ok(true));
    feed(&ctl, "ambient", Some(40.0), t(609));
    assert!(ctl.snapshot(t(609)).ambient_lockout_active);
    feed(&ctl, "ambient", Some(40.0), t(610));
    assert!(!ctl.snapshot(t(610)).ambient_lockout_active);
}

// ── Comms fail-safe ───────────────────────────────────────────

#[test]
fn comms_loss_is_reported_but_control_continues() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    feed(&ctl, "supply", Some(50.0), t(0));
    ctl.set_override(Device::Pump, OverrideValue::On, t(0));

    let d = ctl.tick(t(75), &mut hw, &mut sink);
    assert!(d.pump_on);
    assert!(!ctl.snapshot(t(75)).comms_lost);

    let d = ctl.tick(t(76), &mut hw, &mut sink);
    assert!(d.pump_on);
    assert!(ctl.snapshot(t(76)).comms_lost);
    assert_eq!(
        sink.count(|e| *e == AppEvent::FaultDetected(SafetyFault::CommsLost.mask())),
        1
    );

    ctl.notify_remote_link_activity(t(80));
    assert!(!ctl.snapshot(t(80)).comms_lost);
    ctl.tick(t(81), &mut hw, &mut sink);
    assert_eq!(sink.events.last(), Some(&AppEvent::FaultCleared));
}

// ── Commands & persistence ────────────────────────────────────

#[test]
fn setpoint_changes_are_validated_and_persisted() {
    let ctl = controller(MemStorage::new());

    assert_eq!(ctl.set_setpoint(42.0), Ok(true));
    assert_eq!(ctl.set_setpoint(42.0), Ok(false));
    assert_eq!(ctl.set_setpoint(f32::NAN), Err(CommandError::NonFiniteValue));
    assert_eq!(
        ctl.set_differential(0.0),
        Err(CommandError::NonPositiveDifferential)
    );

    assert_eq!(ctl.storage().writes(), vec![SETPOINT_KEY.to_owned()]);
    let rec = ctl.storage().json(SETPOINT_KEY).unwrap();
    assert_eq!(rec["setpoint_f"], 42.0);
}

#[test]
fn condenser_override_is_never_persisted() {
    let ctl = controller(MemStorage::new());
    ctl.set_override(Device::Pump, OverrideValue::Off, t(0));
    ctl.set_override(Device::Condenser, OverrideValue::On, t(0));

    let rec = ctl.storage().json(OVERRIDES_KEY).unwrap();
    assert_eq!(rec["pump"], "off");
    assert_eq!(rec["condenser"], "auto");

    let restarted = Controller::new(
        &test_config(),
        MemStorage::new().with_record(OVERRIDES_KEY, &ctl.storage().raw(OVERRIDES_KEY).unwrap()),
        t(0),
    );
    let snap = restarted.snapshot(t(0));
    assert_eq!(snap.overrides.pump, OverrideValue::Off);
    assert_eq!(snap.overrides.condenser, OverrideValue::Auto);
    assert!(!snap.records.overrides.is_defaulted());
}

#[test]
fn unchanged_values_are_not_rewritten() {
    let ctl = controller(MemStorage::new());
    let snap = ctl.snapshot(t(0));

    assert_eq!(ctl.set_setpoint(snap.setpoint_f), Ok(false));
    assert_eq!(ctl.set_differential(snap.differential_f), Ok(false));
    assert_eq!(
        ctl.set_ambient_lockout_setpoint(snap.ambient_lockout_setpoint_f, t(0)),
        Ok(false)
    );
    for device in [Device::Pump, Device::Condenser, Device::CoolingCall] {
        assert!(!ctl.set_override(device, OverrideValue::Auto, t(0)));
    }
    assert!(ctl.storage().writes().is_empty());

    // An override that already holds is not written a second time.
    assert!(ctl.set_override(Device::Pump, OverrideValue::On, t(0)));
    assert!(!ctl.set_override(Device::Pump, OverrideValue::On, t(1)));
    assert_eq!(ctl.storage().writes(), vec![OVERRIDES_KEY.to_owned()]);
}

#[test]
fn condenser_override_changes_skip_storage() {
    let ctl = controller(MemStorage::new());
    assert!(ctl.set_override(Device::Condenser, OverrideValue::On, t(0)));
    assert!(ctl.set_override(Device::Condenser, OverrideValue::Off, t(1)));
    assert_eq!(ctl.snapshot(t(1)).overrides.condenser, OverrideValue::Off);
    assert!(ctl.storage().writes().is_empty());
}

#[test]
fn repeating_the_lockout_setpoint_keeps_the_debounce() {
    let ctl = controller(MemStorage::new());
    let setpoint = ctl.snapshot(t(0)).ambient_lockout_setpoint_f;

    feed(&ctl, "ambient", Some(40.0), t(0));
    feed(&ctl, "ambient", Some(40.0), t(150));
    assert_eq!(ctl.set_ambient_lockout_setpoint(setpoint, t(150)), Ok(false));

    feed(&ctl, "ambient", Some(40.0), t(299));
    assert!(!ctl.snapshot(t(299)).ambient_lockout_active);
    feed(&ctl, "ambient", Some(40.0), t(300));
    assert!(ctl.snapshot(t(300)).ambient_lockout_active);
    assert!(ctl.storage().writes().is_empty());
}

#[test]
fn storage_failure_does_not_block_changes() {
    let ctl = controller(MemStorage::failing());
    assert_eq!(ctl.set_setpoint(40.0), Ok(true));
    assert_eq!(ctl.snapshot(t(0)).setpoint_f, 40.0);
    assert_eq!(ctl.storage().writes(), vec![SETPOINT_KEY.to_owned()]);
    assert_eq!(ctl.storage().raw(SETPOINT_KEY), None);
}

#[test]
fn handle_command_dispatches() {
    let ctl = controller(MemStorage::new());
    let cmds = [
        "setpoint 44",
        "differential 2.5",
        "lockout 35",
        "override cooling on",
        "refresh",
    ];
    for line in cmds {
        let cmd: RemoteCommand = line.parse().unwrap();
        ctl.handle_command(cmd, t(1)).unwrap();
    }
    let snap = ctl.snapshot(t(1));
    assert_eq!(snap.setpoint_f, 44.0);
    assert_eq!(snap.differential_f, 2.5);
    assert_eq!(snap.ambient_lockout_setpoint_f, 35.0);
    assert_eq!(snap.overrides.cooling_call, OverrideValue::On);
    assert!(ctl.take_telemetry_request());
    assert!(!ctl.take_telemetry_request());
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn shutdown_releases_condenser_then_pump() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    ctl.start(&mut sink);
    ctl.set_override(Device::Pump, OverrideValue::On, t(0));
    feed(&ctl, "supply", Some(50.0), t(0));
    live_tick(&ctl, 200, &mut hw, &mut sink);
    hw.clear();

    ctl.shutdown(t(205), &mut hw, &mut sink);
    assert_eq!(
        hw.calls,
        vec![
            ActuatorCall::Set { relay: Relay::Condenser, on: false },
            ActuatorCall::Set { relay: Relay::Pump, on: false },
            ActuatorCall::AllOff,
        ]
    );
    assert_eq!(sink.events.first(), Some(&AppEvent::Started));
    assert_eq!(sink.events.last(), Some(&AppEvent::Stopped));
    let snap = ctl.snapshot(t(205));
    assert!(!snap.relays.pump && !snap.relays.condenser);
    assert_eq!(snap.condenser_off_for_secs, Some(0));
}

#[test]
fn telemetry_snapshot_carries_sensors_and_reasons() {
    let ctl = controller(MemStorage::new());
    let mut hw = MockRelays::new();
    let mut sink = RecordingSink::new();
    feed(&ctl, "supply", Some(46.5), t(0));
    live_tick(&ctl, 1, &mut hw, &mut sink);
    ctl.publish_telemetry(t(1), &mut sink);

    let Some(AppEvent::Telemetry(snap)) = sink.events.last() else {
        panic!("expected telemetry");
    };
    assert_eq!(snap.sensor("supply"), Some(46.5));
    assert_eq!(snap.sensor("ambient"), None);
    assert_eq!(snap.pump_reason, Some(PumpReason::NoDemand));
    assert!(snap.records.setpoint.is_defaulted());
}
