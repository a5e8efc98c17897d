//! Per-parameter threshold classification.
//!
//! Maps one measured value onto a `RiskLevel` bucket. Values sitting exactly
//! on a threshold stay in the lower-risk bucket:
//!
//! ```text
//! higher_is_worse  [t1, t2, t3]:  v <= t1 → 0,  v <= t2 → 1,  v <= t3 → 2,  else 3
//! lower_is_worse   [t1, t2, t3]:  v >= t1 → 0,  v >= t2 → 1,  v >= t3 → 2,  else 3
//! ```
//!
//! # Absent values
//! A missing or non-finite value classifies as `RiskLevel::SAFE`, so a dead
//! sensor during a storm under-reports risk.

use crate::model::{Direction, ParameterSpec, RiskLevel};

/// Classifies `value` for the parameter described by `spec`.
///
/// Pure: no I/O, no logging, no state.
pub fn classify(value: Option<f64>, spec: &ParameterSpec) -> RiskLevel {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return RiskLevel::SAFE;
    };
    let [t1, t2, t3] = spec.thresholds;
    let bucket = match spec.direction {
        Direction::HigherIsWorse => {
            if v <= t1 {
                0
            } else if v <= t2 {
                1
            } else if v <= t3 {
                2
            } else {
                3
            }
        }
        Direction::LowerIsWorse => {
            if v >= t1 {
                0
            } else if v >= t2 {
                1
            } else if v >= t3 {
                2
            } else {
                3
            }
        }
    };
    RiskLevel::new(bucket)
}
