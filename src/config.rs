//! Configuration for the coastal threat service.
//!
//! Two layers:
//! - `ScoringConfig`: thresholds and weights, loaded once at startup from a
//!   TOML file or the built-in registry, validated, then shared read-only as
//!   `Arc<ScoringConfig>` for the life of the process.
//! - `ServiceConfig`: runtime settings (bind address, dataset path, replay
//!   cadence, CORS origins, logging) read from the environment after `.env`
//!   has been loaded.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::model::{is_reading_field, Direction, ParameterSpec, ThreatError};
use crate::parameters;
use crate::replay::sequence::{ReplayMode, ReplayOptions};

// ============================================================================
// Scoring configuration
// ============================================================================

/// Validated, immutable scoring rules.
///
/// The only way to obtain one is through a validating constructor, so a
/// `ScoringConfig` in hand always has a positive total weight and a spec
/// for every parameter it lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    parameters: Vec<ParameterSpec>,
    total_weight: f64,
}

/// On-disk layout of a scoring config file.
#[derive(Debug, Deserialize)]
struct ScoringFile {
    #[serde(rename = "parameter", default)]
    parameters: Vec<ParameterSpec>,
}

impl ScoringConfig {
    /// Validate `parameters` and precompute the total weight.
    pub fn new(parameters: Vec<ParameterSpec>) -> Result<Self, ThreatError> {
        if parameters.is_empty() {
            return Err(ThreatError::Config("no parameters configured".into()));
        }

        let mut seen = HashSet::new();
        for spec in &parameters {
            validate_spec(spec)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(ThreatError::Config(format!(
                    "parameter '{}' is configured more than once",
                    spec.name
                )));
            }
        }

        let total_weight: f64 = parameters.iter().map(|p| p.weight).sum();
        if total_weight <= 0.0 {
            return Err(ThreatError::Config(format!(
                "total weight must be positive, got {}",
                total_weight
            )));
        }

        Ok(Self {
            parameters,
            total_weight,
        })
    }

    /// The built-in rule set from `parameters::PARAMETER_REGISTRY`.
    pub fn builtin() -> Self {
        let parameters = parameters::default_specs();
        let total_weight = parameters.iter().map(|p| p.weight).sum();
        Self {
            parameters,
            total_weight,
        }
    }

    /// Parse and validate a TOML document of `[[parameter]]` tables.
    pub fn from_toml_str(text: &str) -> Result<Self, ThreatError> {
        let file: ScoringFile = toml::from_str(text)?;
        Self::new(file.parameters)
    }

    /// Load from a file path.
    pub fn load(path: &Path) -> Result<Self, ThreatError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ThreatError::Config(format!("cannot read scoring config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` if given, otherwise fall back to the registry.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ThreatError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::builtin()),
        }
    }

    /// Parameters in evaluation order.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }
}

fn validate_spec(spec: &ParameterSpec) -> Result<(), ThreatError> {
    if !is_reading_field(&spec.name) {
        return Err(ThreatError::Config(format!(
            "parameter '{}' is not a sensor reading field",
            spec.name
        )));
    }
    if !spec.weight.is_finite() || spec.weight < 0.0 {
        return Err(ThreatError::Config(format!(
            "parameter '{}' has invalid weight {}",
            spec.name, spec.weight
        )));
    }
    let [t1, t2, t3] = spec.thresholds;
    if !(t1.is_finite() && t2.is_finite() && t3.is_finite()) {
        return Err(ThreatError::Config(format!(
            "parameter '{}' has non-finite thresholds",
            spec.name
        )));
    }
    let ordered = match spec.direction {
        Direction::HigherIsWorse => t1 < t2 && t2 < t3,
        Direction::LowerIsWorse => t1 > t2 && t2 > t3,
    };
    if !ordered {
        return Err(ThreatError::Config(format!(
            "parameter '{}' thresholds {:?} are not ordered for {:?}",
            spec.name, spec.thresholds, spec.direction
        )));
    }
    Ok(())
}

// ============================================================================
// Service configuration
// ============================================================================

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:7777";
pub const DEFAULT_DATA_PATH: &str = "data/processed/cleaned_weather.csv";
pub const DEFAULT_LOCATION_ID: &str = "PORBANDAR";

/// Runtime settings for the HTTP service and replay streams.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub data_path: PathBuf,
    pub scoring_config_path: Option<PathBuf>,
    pub stream_interval: Duration,
    /// Capacity of each stream's assessment channel.
    pub stream_buffer: usize,
    pub replay: ReplayOptions,
    pub location_id: String,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            scoring_config_path: None,
            stream_interval: Duration::from_millis(2000),
            stream_buffer: 8,
            replay: ReplayOptions::default(),
            location_id: DEFAULT_LOCATION_ID.to_string(),
            cors_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:5173".to_string(),
            ],
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ServiceConfig {
    /// Load `.env` (if present) and read settings from the environment.
    pub fn from_env() -> Result<Self, ThreatError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ThreatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("THREAT_BIND_ADDR") {
            cfg.bind_addr = v;
        }
        if let Some(v) = lookup("THREAT_DATA_PATH") {
            cfg.data_path = PathBuf::from(v);
        }
        cfg.scoring_config_path = lookup("THREAT_SCORING_CONFIG").map(PathBuf::from);

        if let Some(ms) = parse_var::<u64>(&lookup, "THREAT_STREAM_INTERVAL_MS")? {
            cfg.stream_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "THREAT_STREAM_BUFFER")? {
            if n == 0 {
                return Err(ThreatError::Config("THREAT_STREAM_BUFFER must be at least 1".into()));
            }
            cfg.stream_buffer = n;
        }

        if let Some(mode) = lookup("THREAT_REPLAY_MODE") {
            cfg.replay.mode = match mode.trim().to_ascii_lowercase().as_str() {
                "full" => ReplayMode::Full,
                "highlight" => ReplayMode::Highlight,
                other => {
                    return Err(ThreatError::Config(format!(
                        "THREAT_REPLAY_MODE must be 'full' or 'highlight', got '{}'",
                        other
                    )));
                }
            };
        }
        if let Some(looping) = parse_var::<bool>(&lookup, "THREAT_REPLAY_LOOP")? {
            cfg.replay.looping = looping;
        }
        cfg.replay.peak_index = parse_var::<usize>(&lookup, "THREAT_PEAK_INDEX")?;
        if let Some(n) = parse_var::<usize>(&lookup, "THREAT_WINDOW_LENGTH")? {
            cfg.replay.window_length = n;
        }
        if let Some(n) = parse_var::<usize>(&lookup, "THREAT_CALM_LENGTH")? {
            cfg.replay.calm_length = n;
        }

        if let Some(v) = lookup("THREAT_LOCATION_ID") {
            cfg.location_id = v;
        }
        if let Some(v) = lookup("THREAT_CORS_ORIGINS") {
            cfg.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("THREAT_LOG_LEVEL") {
            cfg.log_level = v;
        }
        cfg.log_file = lookup("THREAT_LOG_FILE").map(PathBuf::from);

        Ok(cfg)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ThreatError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ThreatError::Config(format!("{} = '{}': {}", key, raw, e))),
    }
}
