//! Coastal weather threat scoring and replay service.
//!
//! Scores beach weather-station readings against per-parameter thresholds,
//! turns the weighted result into a 0-100 threat score and level, and
//! replays historical tables as a paced live feed over HTTP.

pub mod analysis;
pub mod api;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod parameters;
pub mod replay;
pub mod serde_utils;
pub mod threat;
