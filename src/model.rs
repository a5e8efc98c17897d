/// SensorReading, RiskLevel, ThreatLevel, ThreatAssessment, ThreatError
/// core data structures and error handling
///
/// Core data types for the coastal threat assessment service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no scoring logic and no I/O, only types and the small
/// accessors that keep parameter-name lookups in one place.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Parameter names
// ---------------------------------------------------------------------------

/// Mean wind speed column in the processed table.
pub const PARAM_WIND_SPEED: &str = "wind_speed";

/// Peak gust column in the processed table.
pub const PARAM_MAX_WIND_SPEED: &str = "maximum_wind_speed";

/// Relative humidity, percent.
pub const PARAM_HUMIDITY: &str = "humidity";

/// Rain intensity, mm/hr.
pub const PARAM_RAIN_INTENSITY: &str = "rain_intensity";

/// Barometric pressure, hPa. The only lower-is-worse parameter by default.
pub const PARAM_PRESSURE: &str = "barometric_pressure";

/// Air temperature is carried through but never scored.
pub const PARAM_AIR_TEMPERATURE: &str = "air_temperature";

/// Every numeric field a `SensorReading` exposes by name.
pub const READING_FIELDS: &[&str] = &[
    PARAM_AIR_TEMPERATURE,
    PARAM_HUMIDITY,
    PARAM_RAIN_INTENSITY,
    PARAM_WIND_SPEED,
    PARAM_MAX_WIND_SPEED,
    PARAM_PRESSURE,
];

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single point-in-time observation from a coastal weather station.
///
/// Every measurement is optional. Absent or non-finite values are scored as
/// `RiskLevel::SAFE` by the classifier, so a reading with no fields at all
/// is valid input and scores 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default, with = "crate::serde_utils::optional_timestamp")]
    pub measurement_timestamp: Option<NaiveDateTime>,
    #[serde(default)]
    pub air_temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub rain_intensity: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub maximum_wind_speed: Option<f64>,
    #[serde(default)]
    pub barometric_pressure: Option<f64>,
}

impl SensorReading {
    /// Looks up a numeric field by its column name.
    ///
    /// Returns `None` both for an absent measurement and for a name that is
    /// not a reading field; `is_reading_field` tells the two apart.
    pub fn value_of(&self, parameter: &str) -> Option<f64> {
        match parameter {
            PARAM_AIR_TEMPERATURE => self.air_temperature,
            PARAM_HUMIDITY => self.humidity,
            PARAM_RAIN_INTENSITY => self.rain_intensity,
            PARAM_WIND_SPEED => self.wind_speed,
            PARAM_MAX_WIND_SPEED => self.maximum_wind_speed,
            PARAM_PRESSURE => self.barometric_pressure,
            _ => None,
        }
    }

    /// Mutable counterpart of `value_of`, used by the table loaders.
    pub fn slot_mut(&mut self, parameter: &str) -> Option<&mut Option<f64>> {
        match parameter {
            PARAM_AIR_TEMPERATURE => Some(&mut self.air_temperature),
            PARAM_HUMIDITY => Some(&mut self.humidity),
            PARAM_RAIN_INTENSITY => Some(&mut self.rain_intensity),
            PARAM_WIND_SPEED => Some(&mut self.wind_speed),
            PARAM_MAX_WIND_SPEED => Some(&mut self.maximum_wind_speed),
            PARAM_PRESSURE => Some(&mut self.barometric_pressure),
            _ => None,
        }
    }
}

/// Returns `true` if `parameter` names a numeric `SensorReading` field.
pub fn is_reading_field(parameter: &str) -> bool {
    READING_FIELDS.contains(&parameter)
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Which side of the thresholds is dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsWorse,
    LowerIsWorse,
}

/// Thresholds, direction and weight for one scored parameter.
///
/// Thresholds are listed in order of increasing severity:
///   higher_is_worse: t1 < t2 < t3
///   lower_is_worse:  t1 > t2 > t3
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub thresholds: [f64; 3],
    pub direction: Direction,
    pub weight: f64,
}

// ---------------------------------------------------------------------------
// Assessment types
// ---------------------------------------------------------------------------

/// Discretised severity of a single parameter, 0 (Safe) to 3 (Danger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskLevel(u8);

impl RiskLevel {
    pub const SAFE: RiskLevel = RiskLevel(0);
    pub const CAUTION: RiskLevel = RiskLevel(1);
    pub const WARNING: RiskLevel = RiskLevel(2);
    pub const DANGER: RiskLevel = RiskLevel(3);
    pub const MAX: u8 = 3;

    /// Builds a level from a raw bucket index, saturating at `DANGER`.
    pub fn new(level: u8) -> Self {
        RiskLevel(level.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Fraction of the maximum level, in `[0, 1]`.
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / f64::from(Self::MAX)
    }

    pub fn label(self) -> &'static str {
        ThreatLevel::from_risk(self).label()
    }
}

/// Overall threat category derived from the 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Safe,
    Caution,
    Warning,
    Danger,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 4] = [
        ThreatLevel::Safe,
        ThreatLevel::Caution,
        ThreatLevel::Warning,
        ThreatLevel::Danger,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ThreatLevel::Safe => "Safe",
            ThreatLevel::Caution => "Caution",
            ThreatLevel::Warning => "Warning",
            ThreatLevel::Danger => "Danger",
        }
    }

    /// Same label for the same bucket index.
    pub fn from_risk(risk: RiskLevel) -> Self {
        Self::ALL[usize::from(risk.value())]
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The scored output for one reading.
///
/// Built fresh for every scoring call and never cached. `parameters` is a
/// `BTreeMap` so serialized output is stable across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    /// Weighted score, rounded to 2 decimals, within `[0, 100]`.
    pub score: f64,
    pub level: ThreatLevel,
    pub parameters: BTreeMap<String, RiskLevel>,
    pub raw: SensorReading,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// How a replay stream came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    /// A non-looping sequence emitted its last reading.
    Exhausted,
    /// The cancel signal fired.
    Cancelled,
    /// The receiving side went away, or the producer task died.
    ConsumerGone,
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEnd::Exhausted => write!(f, "exhausted"),
            StreamEnd::Cancelled => write!(f, "cancelled"),
            StreamEnd::ConsumerGone => write!(f, "consumer gone"),
        }
    }
}

/// Errors raised by the service.
///
/// Scoring never fails on bad reading data; only configuration faults and
/// missing resources surface here.
#[derive(Debug, Error)]
pub enum ThreatError {
    /// Malformed or inconsistent scoring/service configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backing dataset is missing, empty or unreadable.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A request payload could not be parsed into a reading.
    #[error("Malformed reading: {0}")]
    MalformedReading(String),

    /// Normal or cancelled end of a replay stream.
    #[error("Stream terminated: {0}")]
    StreamTerminated(StreamEnd),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ThreatError {
    /// `true` for resource absence, which may clear up if retried later.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ThreatError::DataUnavailable(_) | ThreatError::Io(_) | ThreatError::Csv(_)
        )
    }
}
