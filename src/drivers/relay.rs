//! Relay coil driver.
//!
//! Maps "energised / released" onto an output level according to the
//! board's relay polarity.  Some relay boards are active-low, so a
//! released relay may be a high pin.
//!
//! ## Safety contract
//!
//! The driver releases the relay at construction.  It does not decide
//! anything; the controller alone chooses when to energise.

use embedded_hal::digital::OutputPin;

pub struct RelayDriver<P: OutputPin> {
    pin: P,
    active_high: bool,
    energised: bool,
}

impl<P: OutputPin> RelayDriver<P> {
    /// Take ownership of `pin` and drive it to the released level.
    pub fn new(pin: P, active_high: bool) -> Result<Self, P::Error> {
        let mut relay = Self {
            pin,
            active_high,
            energised: true,
        };
        relay.set(false)?;
        Ok(relay)
    }

    /// The level a released relay sits at.
    pub fn released_level_high(active_high: bool) -> bool {
        !active_high
    }

    pub fn set(&mut self, energise: bool) -> Result<(), P::Error> {
        if energise == self.active_high {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        self.energised = energise;
        Ok(())
    }

    pub fn is_energised(&self) -> bool {
        self.energised
    }
}
