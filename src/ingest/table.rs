/// Processed sensor table reader
///
/// Reads the canonical CSV produced by the data-preparation pass
/// (`ingest::prep`) into `SensorReading`s. The table is assumed to be clean
/// and sorted already; this reader does not re-validate it. Cells that are
/// empty, `null`, `NaN` or otherwise unparsable become `None` and are later
/// scored as absent.
///
/// Expected header (column order does not matter):
/// `measurement_timestamp, air_temperature, humidity, rain_intensity,
///  wind_speed, maximum_wind_speed, barometric_pressure`
/// plus an optional `station_name`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::logging::Component;
use crate::model::{is_reading_field, SensorReading, ThreatError};
use crate::serde_utils::parse_timestamp;

/// Column holding the observation time.
pub const TIMESTAMP_COLUMN: &str = "measurement_timestamp";

/// Optional column naming the reporting station.
pub const STATION_COLUMN: &str = "station_name";

// ============================================================================
// Readers
// ============================================================================

/// Load the processed table at `path`.
///
/// A missing file or a table without data rows is `DataUnavailable`; the
/// caller decides whether to retry later.
pub fn load_table(path: &Path) -> Result<Vec<SensorReading>, ThreatError> {
    let file = File::open(path).map_err(|e| {
        ThreatError::DataUnavailable(format!("cannot open {}: {}", path.display(), e))
    })?;
    let rows = read_table(file)?;
    if rows.is_empty() {
        return Err(ThreatError::DataUnavailable(format!(
            "{} contains no readings",
            path.display()
        )));
    }
    debug!(
        component = %Component::Dataset,
        path = %path.display(),
        rows = rows.len(),
        "processed table loaded"
    );
    Ok(rows)
}

/// Read every row of a processed table from any reader.
pub fn read_table<R: Read>(reader: R) -> Result<Vec<SensorReading>, ThreatError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut readings = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut reading = SensorReading::default();

        for (header, value) in headers.iter().zip(record.iter()) {
            match header.as_str() {
                TIMESTAMP_COLUMN => reading.measurement_timestamp = parse_timestamp(value),
                STATION_COLUMN => {
                    if !value.is_empty() {
                        reading.station_name = Some(value.to_string());
                    }
                }
                name if is_reading_field(name) => {
                    if let Some(slot) = reading.slot_mut(name) {
                        *slot = parse_field(value);
                    }
                }
                _ => {} // Extra columns are ignored
            }
        }

        readings.push(reading);
    }

    Ok(readings)
}

/// Load the table and return its final row, the most recent observation.
pub fn latest_reading(path: &Path) -> Result<SensorReading, ThreatError> {
    let mut rows = load_table(path)?;
    rows.pop()
        .ok_or_else(|| ThreatError::DataUnavailable(format!("{} is empty", path.display())))
}

/// Parse a numeric cell that might be blank or a null marker.
pub fn parse_field(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("nan") {
        None
    } else {
        s.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

// ============================================================================
// Tests
// ============================================================================
