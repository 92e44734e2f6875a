//! TFT: Tessera Forecast Toolkit
//!
//! Monte Carlo forecasting for project cost/duration and sales-pipeline
//! revenue, with a calibration loop that tunes each team's volatility from
//! observed outcomes.

pub mod cli;
pub mod core;
