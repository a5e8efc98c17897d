//! Rule-based threat scoring.
//!
//! Submodules:
//! - `thresholds`: classifies a single value into a `RiskLevel`.
//! - `aggregate`: combines per-parameter risk into a `ThreatAssessment`.

pub mod aggregate;
pub mod thresholds;

pub use aggregate::{level_for_score, score};
pub use thresholds::classify;
