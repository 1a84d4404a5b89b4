//! Motion primitives built on the peripheral ports.

pub mod scan;
pub mod turn;
