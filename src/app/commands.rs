//! Inbound commands to the controller.
//!
//! These represent actions requested by the outside world (remote
//! supervisor, operator console) that the
//! [`Controller`](super::service::Controller) interprets and acts upon.
//! Text is parsed into these at the adapter boundary; the core never sees
//! raw strings.

use core::str::FromStr;

use crate::error::CommandError;
use crate::state::{Device, OverrideValue};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    /// Change the condenser cut-out temperature (°F).
    SetSetpoint(f32),

    /// Change the condenser hysteresis width (°F, > 0).
    SetDifferential(f32),

    /// Change the ambient temperature below which auto cooling locks out.
    SetAmbientLockoutSetpoint(f32),

    /// Force a device on / off, or hand it back to auto.
    SetOverride(Device, OverrideValue),

    /// The air handler is calling for cooling.
    RemoteCall,

    /// Publish telemetry at the next opportunity.
    RefreshTelemetry,
}

fn parse_f32(arg: Option<&str>) -> Result<f32, CommandError> {
    let v: f32 = arg
        .ok_or(CommandError::MissingArgument)?
        .parse()
        .map_err(|_| CommandError::InvalidArgument)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CommandError::NonFiniteValue)
    }
}

/// Line syntax used by the console and any line-oriented link:
///
/// ```text
/// setpoint 44.5
/// differential 3
/// lockout 50
/// override <pump|condenser|cooling> <on|off|auto>
/// call
/// refresh
/// ```
impl FromStr for RemoteCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::UnknownCommand)?;
        let cmd = match verb.to_ascii_lowercase().as_str() {
            "setpoint" => Self::SetSetpoint(parse_f32(words.next())?),
            "differential" => Self::SetDifferential(parse_f32(words.next())?),
            "lockout" => Self::SetAmbientLockoutSetpoint(parse_f32(words.next())?),
            "override" => {
                let device: Device = words.next().ok_or(CommandError::MissingArgument)?.parse()?;
                let value: OverrideValue =
                    words.next().ok_or(CommandError::MissingArgument)?.parse()?;
                Self::SetOverride(device, value)
            }
            "call" => Self::RemoteCall,
            "refresh" => Self::RefreshTelemetry,
            _ => return Err(CommandError::UnknownCommand),
        };
        if words.next().is_some() {
            return Err(CommandError::InvalidArgument);
        }
        Ok(cmd)
    }
}
