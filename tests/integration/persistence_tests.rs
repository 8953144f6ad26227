//! Record persistence through the real file store.

use std::fs;

use chiller::adapters::files::{FileStore, JsonConfigFile};
use chiller::app::ports::{ConfigError, ConfigPort};
use chiller::app::service::Controller;
use chiller::persistence::{DefaultReason, RecordOrigin};
use chiller::state::{Device, OverrideValue};

use crate::mock_hw::{t, test_config};

#[test]
fn parameters_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let ctl = Controller::new(&test_config(), FileStore::new(dir.path()), t(0));
        ctl.set_setpoint(43.5).unwrap();
        ctl.set_differential(4.0).unwrap();
        ctl.set_ambient_lockout_setpoint(38.0, t(0)).unwrap();
        ctl.set_override(Device::Pump, OverrideValue::On, t(0));
        ctl.set_override(Device::CoolingCall, OverrideValue::Off, t(0));
        ctl.set_override(Device::Condenser, OverrideValue::Off, t(0));
    }

    let ctl = Controller::new(&test_config(), FileStore::new(dir.path()), t(0));
    let snap = ctl.snapshot(t(0));
    assert_eq!(snap.setpoint_f, 43.5);
    assert_eq!(snap.differential_f, 4.0);
    assert_eq!(snap.ambient_lockout_setpoint_f, 38.0);
    assert_eq!(snap.overrides.pump, OverrideValue::On);
    assert_eq!(snap.overrides.cooling_call, OverrideValue::Off);
    assert_eq!(snap.overrides.condenser, OverrideValue::Auto);
    assert_eq!(snap.records.setpoint, RecordOrigin::Restored);
    assert_eq!(snap.records.operational, RecordOrigin::Restored);
    assert_eq!(snap.records.overrides, RecordOrigin::Restored);
}

#[test]
fn missing_and_malformed_records_fall_back_independently() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    fs::write(store.path_for("setpoint"), "{ not json").unwrap();
    fs::write(
        store.path_for("operational_params"),
        r#"{"version":1,"differential_f":-1.0,"ambient_lockout_setpoint_f":40.0}"#,
    )
    .unwrap();

    let cfg = test_config();
    let ctl = Controller::new(&cfg, store, t(0));
    let snap = ctl.snapshot(t(0));

    assert_eq!(snap.setpoint_f, cfg.fallback_setpoint_f);
    assert_eq!(snap.differential_f, cfg.initial_differential_f);
    assert_eq!(
        snap.records.setpoint,
        RecordOrigin::Defaulted(DefaultReason::Malformed)
    );
    assert_eq!(
        snap.records.operational,
        RecordOrigin::Defaulted(DefaultReason::Malformed)
    );
    assert_eq!(
        snap.records.overrides,
        RecordOrigin::Defaulted(DefaultReason::Missing)
    );
}

#[test]
fn stored_condenser_override_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    fs::write(
        store.path_for("overrides"),
        r#"{"version":1,"pump":"auto","condenser":"on","cooling_call":"on"}"#,
    )
    .unwrap();

    let ctl = Controller::new(&test_config(), store, t(0));
    let snap = ctl.snapshot(t(0));
    assert_eq!(snap.overrides.condenser, OverrideValue::Auto);
    assert_eq!(snap.overrides.cooling_call, OverrideValue::On);
}

#[test]
fn config_file_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    fs::write(
        &path,
        r#"{"fallback_setpoint_f":44.0,"sensors":[{"key":"supply","device_id":"28-0000"}]}"#,
    )
    .unwrap();
    let cfg = JsonConfigFile::new(&path).load().unwrap();
    assert_eq!(cfg.fallback_setpoint_f, 44.0);
    assert_eq!(cfg.condenser_min_off_time_secs, 120);
    assert_eq!(cfg.sensors.len(), 1);

    fs::write(&path, r#"{"initial_differential_f":0.0}"#).unwrap();
    assert!(matches!(
        JsonConfigFile::new(&path).load(),
        Err(ConfigError::ValidationFailed(_))
    ));
}
