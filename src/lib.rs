//! Chiller controller library.
//!
//! Closed-loop control of a chilled-water plant: one circulation pump and
//! one condensing unit, driven from temperature probes, an air-handler
//! cooling call and operator commands.  Everything except the adapters is
//! pure logic and runs under test without hardware.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod persistence;
pub mod runtime;
pub mod safety;
pub mod sensors;
pub mod state;
