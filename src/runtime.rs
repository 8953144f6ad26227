//! Cooperative runtime: sensing, control and telemetry loops.
//!
//! All three loops run on one thread under `edge-executor`, with
//! `async-io-mini` reactor timers for their periods (no busy-spinning).
//! Remote commands arrive on a separate thread and go straight into the
//! [`Controller`], which is internally synchronised.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  futures_lite::future::block_on                          │
//!  │  ┌────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                      │  │
//!  │  │                                                    │  │
//!  │  │  ┌──────────┐   ┌──────────┐   ┌───────────────┐   │  │
//!  │  │  │ Sensing  │   │ Control  │   │ Telemetry     │   │  │
//!  │  │  │ poll ⏱   │   │ tick ⏱   │   │ 1 s check ⏱   │   │  │
//!  │  │  └──────────┘   └──────────┘   └───────────────┘   │  │
//!  │  └────────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every sleep is cut into slices of at most one second that check the
//! [`Shutdown`] flag, so all loops exit within a second of it being set.
//! The control loop always finishes by driving both outputs off.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_io_mini::Timer;
use embassy_time::Instant;
use log::info;

use crate::app::ports::{ActuatorPort, Clock, EventSink, SensorPort, StoragePort};
use crate::app::service::Controller;
use crate::config::SystemConfig;

/// Longest single sleep between shutdown checks.
pub const MAX_SLEEP_SLICE: Duration = Duration::from_secs(1);

// ── Shutdown signal ──────────────────────────────────────────

/// One-shot stop flag shared by every loop and by the signal handler.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Sleep for `total` in slices of at most [`MAX_SLEEP_SLICE`].
/// Returns `false` as soon as shutdown is observed.
pub async fn pause(total: Duration, shutdown: &Shutdown) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if shutdown.is_triggered() {
            return false;
        }
        let slice = remaining.min(MAX_SLEEP_SLICE);
        Timer::after(slice).await;
        remaining = remaining.saturating_sub(slice);
    }
    !shutdown.is_triggered()
}

// ── Loop periods ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPeriods {
    pub sensing: Duration,
    pub control: Duration,
    pub telemetry: Duration,
}

impl LoopPeriods {
    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self {
            sensing: Duration::from_millis(u64::from(cfg.sensor_poll_interval_ms)),
            control: Duration::from_millis(u64::from(cfg.control_loop_interval_ms)),
            telemetry: Duration::from_secs(u64::from(cfg.telemetry_interval_secs)),
        }
    }
}

// ── Loops ────────────────────────────────────────────────────

type SharedSink<K> = Rc<RefCell<K>>;

async fn sensing_loop<S: StoragePort>(
    ctl: &Controller<S>,
    mut sensors: impl SensorPort,
    clock: &impl Clock,
    period: Duration,
    shutdown: &Shutdown,
) {
    loop {
        let batch = sensors.read_all();
        ctl.submit_temperature_batch(&batch, clock.now());
        if !pause(period, shutdown).await {
            break;
        }
    }
    info!("Sensing loop stopped");
}

/// Ticks until shutdown, then drives the outputs off.
async fn control_loop<S: StoragePort, K: EventSink>(
    ctl: &Controller<S>,
    mut hw: impl ActuatorPort,
    sink: SharedSink<K>,
    clock: &impl Clock,
    period: Duration,
    shutdown: &Shutdown,
) {
    ctl.start(&mut *sink.borrow_mut());
    while !shutdown.is_triggered() {
        ctl.tick(clock.now(), &mut hw, &mut *sink.borrow_mut());
        if !pause(period, shutdown).await {
            break;
        }
    }
    ctl.shutdown(clock.now(), &mut hw, &mut *sink.borrow_mut());
    info!("Control loop stopped");
}

/// Publishes on its period, or within a second of a refresh request.
async fn telemetry_loop<S: StoragePort, K: EventSink>(
    ctl: &Controller<S>,
    sink: SharedSink<K>,
    clock: &impl Clock,
    period: Duration,
    shutdown: &Shutdown,
) {
    let mut last: Option<Instant> = None;
    loop {
        let now = clock.now();
        let requested = ctl.take_telemetry_request();
        let due = last.is_none_or(|t| {
            u128::from(now.saturating_duration_since(t).as_millis()) >= period.as_millis()
        });
        if requested || due {
            ctl.publish_telemetry(now, &mut *sink.borrow_mut());
            last = Some(now);
        }
        if !pause(MAX_SLEEP_SLICE, shutdown).await {
            break;
        }
    }
    info!("Telemetry loop stopped");
}

// ── Entry point ──────────────────────────────────────────────

/// Run all loops on the current thread until `shutdown` is triggered and
/// every loop has exited.
pub fn run<S, P, A, K, C>(
    ctl: &Controller<S>,
    periods: LoopPeriods,
    sensors: P,
    actuators: A,
    sink: K,
    clock: C,
    shutdown: &Shutdown,
) where
    S: StoragePort,
    P: SensorPort,
    A: ActuatorPort,
    K: EventSink,
    C: Clock,
{
    let sink: SharedSink<K> = Rc::new(RefCell::new(sink));
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    let sensing = executor.spawn(sensing_loop(ctl, sensors, &clock, periods.sensing, shutdown));
    let control = executor.spawn(control_loop(
        ctl,
        actuators,
        sink.clone(),
        &clock,
        periods.control,
        shutdown,
    ));
    let telemetry = executor.spawn(telemetry_loop(
        ctl,
        sink.clone(),
        &clock,
        periods.telemetry,
        shutdown,
    ));

    info!(
        "Runtime started (sense {:?}, control {:?}, telemetry {:?})",
        periods.sensing, periods.control, periods.telemetry
    );

    futures_lite::future::block_on(executor.run(async {
        sensing.await;
        control.await;
        telemetry.await;
    }));
    info!("Runtime stopped");
}
