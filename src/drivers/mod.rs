//! Output drivers: GPIO lines and the relay coils they switch.

pub mod gpio;
pub mod relay;
