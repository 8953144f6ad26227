//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! [`SensorHub`] is exposed through [`SensorPort`] and the two relay
//! drivers through [`ActuatorPort`].  This is the only module that knows
//! which GPIO line feeds which relay.

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::app::ports::{ActuatorPort, SensorPort, TemperatureBatch};
use crate::config::RelayConfig;
use crate::drivers::gpio::{OutputLine, SimPin, SysfsPin};
use crate::drivers::relay::RelayDriver;
use crate::error::ActuatorError;
use crate::sensors::SensorHub;
use crate::state::Relay;

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for SensorHub {
    fn read_all(&mut self) -> TemperatureBatch {
        self.poll()
    }
}

// ── Relay bank ────────────────────────────────────────────────

/// Pump and condenser relays.
pub struct RelayBank<P: OutputPin<Error = ActuatorError>> {
    pump: RelayDriver<P>,
    condenser: RelayDriver<P>,
}

impl<P: OutputPin<Error = ActuatorError>> RelayBank<P> {
    /// Both relays are released before this returns.
    pub fn new(pump_pin: P, condenser_pin: P, active_high: bool) -> Result<Self, ActuatorError> {
        Ok(Self {
            pump: RelayDriver::new(pump_pin, active_high)?,
            condenser: RelayDriver::new(condenser_pin, active_high)?,
        })
    }

    fn driver(&mut self, relay: Relay) -> &mut RelayDriver<P> {
        match relay {
            Relay::Pump => &mut self.pump,
            Relay::Condenser => &mut self.condenser,
        }
    }
}

impl RelayBank<OutputLine> {
    /// Build from configuration: sysfs GPIO, or in-memory pins when
    /// `relays.simulate` is set.
    pub fn from_config(cfg: &RelayConfig) -> Result<Self, ActuatorError> {
        let idle_high = RelayDriver::<OutputLine>::released_level_high(cfg.active_high);
        let (pump, condenser) = if cfg.simulate {
            info!("Relays: simulated (no GPIO)");
            (
                OutputLine::Sim(SimPin::new(idle_high)),
                OutputLine::Sim(SimPin::new(idle_high)),
            )
        } else {
            let root = std::path::Path::new(SYSFS_GPIO_ROOT);
            (
                OutputLine::Sysfs(SysfsPin::export(root, cfg.pump_gpio, idle_high)?),
                OutputLine::Sysfs(SysfsPin::export(root, cfg.condenser_gpio, idle_high)?),
            )
        };
        info!(
            "Relays: pump=GPIO{} condenser=GPIO{} active_{}",
            cfg.pump_gpio,
            cfg.condenser_gpio,
            if cfg.active_high { "high" } else { "low" }
        );
        Self::new(pump, condenser, cfg.active_high)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<P: OutputPin<Error = ActuatorError>> ActuatorPort for RelayBank<P> {
    fn set_relay(&mut self, relay: Relay, on: bool) -> Result<(), ActuatorError> {
        self.driver(relay).set(on)
    }

    fn all_off(&mut self) {
        for relay in [Relay::Condenser, Relay::Pump] {
            if let Err(e) = self.driver(relay).set(false) {
                error!("Relay {} release failed: {}", relay, e);
            }
        }
    }
}
