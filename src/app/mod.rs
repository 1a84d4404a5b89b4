//! Application core — command intake, dispatch and the port boundary.
//!
//! Operator tokens enter through the [`queue`], become [`commands`], and
//! are applied by the [`service`].  All interaction with hardware and cloud
//! services happens through the traits in [`ports`], keeping the core
//! testable without a car.

pub mod commands;
pub mod events;
pub mod ports;
pub mod queue;
pub mod service;
