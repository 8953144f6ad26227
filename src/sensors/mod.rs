//! Sensor subsystem: 1-Wire probe drivers and the aggregating [`SensorHub`].
//!
//! The hub owns one probe per configured binding and produces a
//! [`TemperatureBatch`] each poll.  A probe that fails to read reports
//! `None` for that poll; it is never substituted with a stale or zero value.

pub mod onewire;

use log::{debug, warn};

use crate::app::ports::TemperatureBatch;
use crate::config::SystemConfig;
use onewire::OneWireProbe;

/// Aggregates all probes.
pub struct SensorHub {
    probes: Vec<OneWireProbe>,
}

impl SensorHub {
    pub fn from_config(config: &SystemConfig) -> Self {
        let probes: Vec<OneWireProbe> = config
            .sensors
            .iter()
            .map(|b| OneWireProbe::new(&config.w1_base_dir, b))
            .collect();
        if probes.is_empty() {
            warn!("SensorHub: no sensors configured, every poll will be empty");
        }
        Self { probes }
    }

    /// Read every probe once.
    pub fn poll(&mut self) -> TemperatureBatch {
        let mut batch = TemperatureBatch::new();
        for probe in &self.probes {
            let value = match probe.read_fahrenheit() {
                Ok(f) => {
                    debug!("Sensor {} = {:.2}F", probe.key(), f);
                    Some(f)
                }
                Err(e) => {
                    warn!("Sensor {} read failed: {}", probe.key(), e);
                    None
                }
            };
            // Bindings are capped at the batch capacity by the config type.
            let _ = batch.push((probe.key().clone(), value));
        }
        batch
    }
}
