//! Autocar controller library.
//!
//! Mode arbitration and reactive navigation for a small autonomous car.
//! Peripherals, the visual tracker and cloud speech/vision services are
//! reached through the port traits in [`app::ports`]; the simulated
//! adapters in [`adapters`] back the host binary and tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod mode;
pub mod speech;
pub mod task;
pub mod watchers;
