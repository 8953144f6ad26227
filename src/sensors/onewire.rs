//! DS18B20 probe on the Linux 1-Wire bus.
//!
//! The kernel `w1_therm` driver exposes each probe as
//! `<base>/<device-id>/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line must end in `YES` (CRC ok); the second carries the
//! temperature in millidegrees Celsius.  Readings are converted to °F and
//! rounded to 0.01.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::SensorBinding;
use crate::error::SensorError;
use crate::state::SensorKey;

#[derive(Debug, Clone)]
pub struct OneWireProbe {
    key: SensorKey,
    /// `None` when the binding carries no device id.
    path: Option<PathBuf>,
}

impl OneWireProbe {
    pub fn new(base_dir: &Path, binding: &SensorBinding) -> Self {
        let path = (!binding.device_id.is_empty())
            .then(|| base_dir.join(binding.device_id.as_str()).join("w1_slave"));
        Self {
            key: binding.key.clone(),
            path,
        }
    }

    pub fn key(&self) -> &SensorKey {
        &self.key
    }

    /// One conversion, in °F.
    pub fn read_fahrenheit(&self) -> Result<f32, SensorError> {
        let path = self.path.as_ref().ok_or(SensorError::NotFound)?;
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SensorError::NotFound,
            _ => SensorError::Io,
        })?;
        parse_w1_slave(&text)
    }
}

/// Parse the two-line `w1_slave` format into °F.
pub fn parse_w1_slave(text: &str) -> Result<f32, SensorError> {
    let mut lines = text.lines();
    let crc_line = lines.next().ok_or(SensorError::Malformed)?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::CrcMismatch);
    }
    let data_line = lines.next().ok_or(SensorError::Malformed)?;
    let pos = data_line.find("t=").ok_or(SensorError::Malformed)?;
    let milli_c: i32 = data_line[pos + 2..]
        .trim()
        .parse()
        .map_err(|_| SensorError::Malformed)?;
    let celsius = milli_c as f32 / 1000.0;
    let fahrenheit = celsius * 9.0 / 5.0 + 32.0;
    Ok((fahrenheit * 100.0).round() / 100.0)
}
