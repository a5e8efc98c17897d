/// Structured logging for the coastal threat service
///
/// Installs a `tracing` subscriber with console output and an optional
/// append-only log file for daemon operation. Every record carries a
/// `component` field so scoring, replay, dataset and API events can be
/// filtered apart. Failures are classified before logging so expected
/// conditions (a dataset not prepared yet, a client hanging up) do not
/// show up as errors.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::model::{StreamEnd, ThreatError};

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Scoring,
    Replay,
    Dataset,
    Api,
    System,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Scoring => "scoring",
            Component::Replay => "replay",
            Component::Dataset => "dataset",
            Component::Api => "api",
            Component::System => "system",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected condition: data not prepared yet, client went away, bad input
    Expected,
    /// Indicates a configuration or programming fault
    Unexpected,
    /// Cannot tell from the error alone
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a service error for logging severity.
pub fn classify_failure(err: &ThreatError) -> FailureType {
    match err {
        ThreatError::DataUnavailable(_)
        | ThreatError::MalformedReading(_)
        | ThreatError::StreamTerminated(_) => FailureType::Expected,
        ThreatError::Config(_) | ThreatError::Toml(_) => FailureType::Unexpected,
        ThreatError::Io(_) | ThreatError::Csv(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, overrides `level`. With `log_file`, records are
/// also appended to that file without ANSI colours.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Result<(), ThreatError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| ThreatError::Config(format!("invalid log level '{}': {}", level, e)))?,
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => registry.try_init(),
    };

    result.map_err(|e| ThreatError::Config(format!("logger already initialised: {}", e)))
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an error with automatic classification.
pub fn log_failure(component: Component, operation: &str, err: &ThreatError) {
    let failure_type = classify_failure(err);
    let recoverable = err.is_recoverable();
    match failure_type {
        FailureType::Expected => {
            info!(component = %component, failure = %failure_type, recoverable, "{} failed: {}", operation, err)
        }
        FailureType::Unexpected => {
            error!(component = %component, failure = %failure_type, recoverable, "{} failed: {}", operation, err)
        }
        FailureType::Unknown => {
            warn!(component = %component, failure = %failure_type, recoverable, "{} failed: {}", operation, err)
        }
    }
}

/// Log how a replay stream finished.
pub fn log_stream_end(stream_id: u64, end: StreamEnd, emitted: u64) {
    info!(
        component = %Component::Replay,
        stream_id,
        emitted,
        end = %end,
        "replay stream ended"
    );
}
