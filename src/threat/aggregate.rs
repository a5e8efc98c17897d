//! Weighted aggregation of per-parameter risk into one threat score.
//!
//! ```text
//! score = Σ (risk_p / 3) · weight_p · 100  /  Σ weight_p
//! ```
//!
//! rounded to two decimals and mapped to a level with fixed cut points:
//! `< 25` Safe, `< 50` Caution, `< 75` Warning, otherwise Danger.

use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::model::{SensorReading, ThreatAssessment, ThreatLevel};
use crate::threat::thresholds::classify;

/// Upper bound of the Safe band (exclusive).
pub const CAUTION_CUT: f64 = 25.0;
/// Upper bound of the Caution band (exclusive).
pub const WARNING_CUT: f64 = 50.0;
/// Upper bound of the Warning band (exclusive).
pub const DANGER_CUT: f64 = 75.0;

/// Scores one reading against `config`.
///
/// Never fails: a `ScoringConfig` is validated at construction, and absent
/// reading fields degrade to risk 0. An empty reading scores 0 / Safe.
/// The reading is cloned into `raw` untouched.
pub fn score(reading: &SensorReading, config: &ScoringConfig) -> ThreatAssessment {
    let mut parameters = BTreeMap::new();
    let mut weighted_sum = 0.0;

    for spec in config.parameters() {
        let risk = classify(reading.value_of(&spec.name), spec);
        weighted_sum += risk.fraction() * spec.weight * 100.0;
        parameters.insert(spec.name.clone(), risk);
    }

    let score = round2((weighted_sum / config.total_weight()).clamp(0.0, 100.0));

    ThreatAssessment {
        score,
        level: level_for_score(score),
        parameters,
        raw: reading.clone(),
    }
}

/// Maps a 0-100 score onto the four threat levels.
pub fn level_for_score(score: f64) -> ThreatLevel {
    if score < CAUTION_CUT {
        ThreatLevel::Safe
    } else if score < WARNING_CUT {
        ThreatLevel::Caution
    } else if score < DANGER_CUT {
        ThreatLevel::Warning
    } else {
        ThreatLevel::Danger
    }
}

/// Rounds half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, ParameterSpec, RiskLevel};

    fn storm_reading() -> SensorReading {
        SensorReading {
            wind_speed: Some(40.0),
            maximum_wind_speed: Some(50.0),
            humidity: Some(99.0),
            rain_intensity: Some(20.0),
            barometric_pressure: Some(970.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_reading_is_safe_zero() {
        let out = score(&SensorReading::default(), &ScoringConfig::builtin());
        assert_eq!(out.score, 0.0);
        assert_eq!(out.level, ThreatLevel::Safe);
        assert_eq!(out.parameters.len(), 5);
        assert!(out.parameters.values().all(|r| *r == RiskLevel::SAFE));
    }

    #[test]
    fn test_every_parameter_at_danger_scores_100() {
        let out = score(&storm_reading(), &ScoringConfig::builtin());
        assert_eq!(out.score, 100.0);
        assert_eq!(out.level, ThreatLevel::Danger);
    }

    #[test]
    fn test_raw_reading_is_preserved() {
        let mut reading = storm_reading();
        reading.humidity = None;
        reading.station_name = Some("Porbandar".to_string());
        let out = score(&reading, &ScoringConfig::builtin());
        assert_eq!(out.raw, reading);
    }

    #[test]
    fn test_score_is_normalised_by_total_weight() {
        // Weights summing to 4 must produce the same score as weights
        // summing to 1 with the same proportions.
        let config = ScoringConfig::new(vec![
            ParameterSpec {
                name: "wind_speed".into(),
                thresholds: [12.0, 22.0, 35.0],
                direction: Direction::HigherIsWorse,
                weight: 2.0,
            },
            ParameterSpec {
                name: "humidity".into(),
                thresholds: [80.0, 90.0, 95.0],
                direction: Direction::HigherIsWorse,
                weight: 2.0,
            },
        ])
        .unwrap();
        let reading = SensorReading {
            wind_speed: Some(40.0),
            humidity: Some(10.0),
            ..Default::default()
        };
        let out = score(&reading, &config);
        assert_eq!(out.score, 50.0);
        assert_eq!(out.level, ThreatLevel::Warning);
    }

    #[test]
    fn test_unconfigured_fields_are_not_scored() {
        let config = ScoringConfig::new(vec![ParameterSpec {
            name: "barometric_pressure".into(),
            thresholds: [1005.0, 995.0, 985.0],
            direction: Direction::LowerIsWorse,
            weight: 1.0,
        }])
        .unwrap();
        let out = score(&storm_reading(), &config);
        assert_eq!(out.parameters.keys().collect::<Vec<_>>(), vec!["barometric_pressure"]);
        assert_eq!(out.score, 100.0);
    }

    #[test]
    fn test_level_cut_points() {
        assert_eq!(level_for_score(0.0), ThreatLevel::Safe);
        assert_eq!(level_for_score(24.99), ThreatLevel::Safe);
        assert_eq!(level_for_score(25.0), ThreatLevel::Caution);
        assert_eq!(level_for_score(49.99), ThreatLevel::Caution);
        assert_eq!(level_for_score(50.0), ThreatLevel::Warning);
        assert_eq!(level_for_score(74.99), ThreatLevel::Warning);
        assert_eq!(level_for_score(75.0), ThreatLevel::Danger);
        assert_eq!(level_for_score(100.0), ThreatLevel::Danger);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(31.666666666666664), 31.67);
        assert_eq!(round2(10.0), 10.0);
        assert_eq!(round2(0.004), 0.0);
    }
}
