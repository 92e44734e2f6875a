//! CLI command implementations

pub mod calibrate;
pub mod completions;
pub mod revenue;
pub mod runs;
pub mod sim;
pub mod team;
