//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                         |
//! |------------|--------------|-------------------------------------|
//! | `console`  | (driver)     | Line-oriented remote command link   |
//! | `files`    | StoragePort  | One JSON file per record            |
//! |            | ConfigPort   | JSON configuration file             |
//! | `hardware` | SensorPort   | 1-Wire probes via sysfs             |
//! |            | ActuatorPort | Relay GPIO lines (sysfs or sim)     |
//! | `log_sink` | EventSink    | `log` output (TELEM lines)          |
//! | `time`     | Clock        | Monotonic host clock                |

pub mod console;
pub mod files;
pub mod hardware;
pub mod log_sink;
pub mod time;
