//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the chiller: command
//! handling, the per-tick control cycle and telemetry.  All interaction
//! with relays, probes, disk and the remote link happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable without
//! real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
