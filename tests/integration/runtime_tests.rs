//! End-to-end run of the cooperative runtime with mock ports.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chiller::adapters::time::MonotonicClock;
use chiller::app::events::AppEvent;
use chiller::app::ports::{ActuatorPort, Clock, EventSink};
use chiller::app::service::Controller;
use chiller::error::ActuatorError;
use chiller::runtime::{self, LoopPeriods, Shutdown};
use chiller::state::{Device, OverrideValue, Relay};

use crate::mock_hw::{ActuatorCall, FixedSensors, MemStorage, MockRelays, RecordingSink, test_config};

struct Shared<T>(Rc<RefCell<T>>);

impl ActuatorPort for Shared<MockRelays> {
    fn set_relay(&mut self, relay: Relay, on: bool) -> Result<(), ActuatorError> {
        self.0.borrow_mut().set_relay(relay, on)
    }

    fn all_off(&mut self) {
        self.0.borrow_mut().all_off();
    }
}

impl EventSink for Shared<RecordingSink> {
    fn emit(&mut self, event: &AppEvent) {
        self.0.borrow_mut().emit(event);
    }
}

#[test]
fn runtime_drives_outputs_and_stops_on_shutdown() {
    let clock = MonotonicClock::new();
    let ctl = Controller::new(&test_config(), MemStorage::new(), clock.now());
    ctl.set_override(Device::Pump, OverrideValue::On, clock.now());

    let relays = Rc::new(RefCell::new(MockRelays::new()));
    let events = Rc::new(RefCell::new(RecordingSink::new()));
    let shutdown = Shutdown::new();

    let trigger = shutdown.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(400));
        trigger.trigger();
    });

    let started = std::time::Instant::now();
    runtime::run(
        &ctl,
        LoopPeriods {
            sensing: Duration::from_millis(50),
            control: Duration::from_millis(50),
            telemetry: Duration::from_secs(60),
        },
        FixedSensors::new(&[("supply", Some(47.0)), ("ambient", Some(70.0))]),
        Shared(Rc::clone(&relays)),
        Shared(Rc::clone(&events)),
        clock,
        &shutdown,
    );
    stopper.join().unwrap();

    // Every loop notices shutdown within one sleep slice.
    assert!(started.elapsed() < Duration::from_secs(3));

    let relays = relays.borrow();
    assert_eq!(relays.calls.first(), Some(&ActuatorCall::Set { relay: Relay::Pump, on: true }));
    assert_eq!(relays.calls.last(), Some(&ActuatorCall::AllOff));
    assert!(!relays.is_on(Relay::Pump));
    assert!(!relays.is_on(Relay::Condenser));

    let events = events.borrow();
    assert!(events.events.contains(&AppEvent::Started));
    assert_eq!(events.events.last(), Some(&AppEvent::Stopped));
    // Telemetry goes out once at startup; the period is far longer than the run.
    assert_eq!(events.telemetry_count(), 1);

    let snap = ctl.snapshot(MonotonicClock::new().now());
    assert_eq!(snap.sensor("supply"), Some(47.0));
    assert!(!snap.relays.pump);
}

#[test]
fn telemetry_request_is_served_promptly() {
    let clock = MonotonicClock::new();
    let ctl = Controller::new(&test_config(), MemStorage::new(), clock.now());
    let events = Rc::new(RefCell::new(RecordingSink::new()));
    let shutdown = Shutdown::new();

    std::thread::scope(|scope| {
        let remote = &ctl;
        let trigger = shutdown.clone();
        scope.spawn(move || {
            std::thread::sleep(Duration::from_millis(1200));
            remote.request_telemetry();
            std::thread::sleep(Duration::from_millis(1300));
            trigger.trigger();
        });

        runtime::run(
            &ctl,
            LoopPeriods {
                sensing: Duration::from_secs(10),
                control: Duration::from_secs(10),
                telemetry: Duration::from_secs(600),
            },
            FixedSensors::new(&[]),
            MockRelays::new(),
            Shared(Rc::clone(&events)),
            clock,
            &shutdown,
        );
    });

    // One at startup, one for the request.
    assert_eq!(events.borrow().telemetry_count(), 2);
    assert!(!ctl.take_telemetry_request());
}
