/// Built-in parameter registry for the coastal threat service.
///
/// Defines the scored weather parameters together with their default
/// thresholds, direction and weight. This is the fallback rule set when no
/// scoring config file is supplied, and the single source of truth for
/// which parameters the service knows how to score. The values are tuned
/// for the Gujarat coast.

use crate::model::{
    Direction, ParameterSpec, PARAM_HUMIDITY, PARAM_MAX_WIND_SPEED, PARAM_PRESSURE,
    PARAM_RAIN_INTENSITY, PARAM_WIND_SPEED,
};

// ---------------------------------------------------------------------------
// Parameter metadata
// ---------------------------------------------------------------------------

/// Default scoring rule for a single parameter.
pub struct ParameterDefault {
    /// Column name in the processed table and field name on `SensorReading`.
    pub name: &'static str,
    /// Unit the thresholds are expressed in.
    pub unit: &'static str,
    /// Caution / Warning / Danger boundaries, in order of increasing severity.
    pub thresholds: [f64; 3],
    pub direction: Direction,
    /// Contribution to the total score.
    pub weight: f64,
}

impl ParameterDefault {
    pub fn to_spec(&self) -> ParameterSpec {
        ParameterSpec {
            name: self.name.to_string(),
            thresholds: self.thresholds,
            direction: self.direction,
            weight: self.weight,
        }
    }
}

/// All parameters scored by default, in evaluation order.
///
/// Pressure and peak gusts carry the most weight: a falling barometer and
/// strong gusts are the earliest reliable storm indicators on this coast.
pub static PARAMETER_REGISTRY: &[ParameterDefault] = &[
    ParameterDefault {
        name: PARAM_WIND_SPEED,
        unit: "m/s",
        thresholds: [12.0, 22.0, 35.0],
        direction: Direction::HigherIsWorse,
        weight: 0.20,
    },
    ParameterDefault {
        name: PARAM_MAX_WIND_SPEED,
        unit: "m/s",
        thresholds: [18.0, 30.0, 45.0],
        direction: Direction::HigherIsWorse,
        weight: 0.30,
    },
    ParameterDefault {
        name: PARAM_HUMIDITY,
        unit: "%",
        thresholds: [80.0, 90.0, 95.0],
        direction: Direction::HigherIsWorse,
        weight: 0.05,
    },
    ParameterDefault {
        name: PARAM_RAIN_INTENSITY,
        unit: "mm/hr",
        thresholds: [2.5, 7.5, 15.0],
        direction: Direction::HigherIsWorse,
        weight: 0.15,
    },
    ParameterDefault {
        name: PARAM_PRESSURE,
        unit: "hPa",
        thresholds: [1005.0, 995.0, 985.0],
        direction: Direction::LowerIsWorse,
        weight: 0.30,
    },
];

/// Looks up a registry entry by name. Returns `None` if not found.
pub fn find_parameter(name: &str) -> Option<&'static ParameterDefault> {
    PARAMETER_REGISTRY.iter().find(|p| p.name == name)
}

/// The registry converted to owned specs, ready for `ScoringConfig::new`.
pub fn default_specs() -> Vec<ParameterSpec> {
    PARAMETER_REGISTRY.iter().map(ParameterDefault::to_spec).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
