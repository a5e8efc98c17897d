//! Raw dataset preparation.
//!
//! Turns a raw beach-weather export into the canonical processed table the
//! rest of the service reads:
//! 1. normalise column names (`"Wind Speed"` → `wind_speed`,
//!    `"Rain Intensity (mm/hr)"` style parentheses dropped)
//! 2. parse `measurement_timestamp`; rows whose timestamp does not parse are
//!    dropped
//! 3. keep only the columns relevant to scoring
//! 4. drop rows with any missing value
//! 5. sort ascending by timestamp (stable, so equal timestamps keep file order)

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::logging::Component;
use crate::model::{
    SensorReading, ThreatError, PARAM_AIR_TEMPERATURE, PARAM_HUMIDITY, PARAM_MAX_WIND_SPEED,
    PARAM_PRESSURE, PARAM_RAIN_INTENSITY, PARAM_WIND_SPEED,
};
use crate::ingest::table::{parse_field, TIMESTAMP_COLUMN};
use crate::serde_utils::{parse_timestamp, ISO_FORMAT};

/// Columns of the processed table, in output order.
pub const PROCESSED_COLUMNS: &[&str] = &[
    TIMESTAMP_COLUMN,
    PARAM_AIR_TEMPERATURE,
    PARAM_HUMIDITY,
    PARAM_RAIN_INTENSITY,
    PARAM_WIND_SPEED,
    PARAM_MAX_WIND_SPEED,
    PARAM_PRESSURE,
];

/// Counts reported after a preparation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepSummary {
    pub rows_read: usize,
    pub bad_timestamps: usize,
    pub incomplete_rows: usize,
    pub rows_kept: usize,
}

/// Normalise a raw header to the lower-case/underscore convention.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(['(', ')'], "")
}

/// Clean a raw table read from `reader`.
///
/// Fails with `DataUnavailable` if a required column is missing after
/// header normalisation.
pub fn prepare_table<R: Read>(reader: R) -> Result<(Vec<SensorReading>, PrepSummary), ThreatError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(normalize_column_name).collect();

    let mut positions = Vec::with_capacity(PROCESSED_COLUMNS.len());
    for column in PROCESSED_COLUMNS {
        let idx = headers.iter().position(|h| h == column).ok_or_else(|| {
            ThreatError::DataUnavailable(format!("raw table is missing column '{}'", column))
        })?;
        positions.push((*column, idx));
    }

    let mut summary = PrepSummary::default();
    let mut rows = Vec::new();

    'records: for record in rdr.records() {
        let record = record?;
        summary.rows_read += 1;

        let mut reading = SensorReading::default();
        for &(column, idx) in &positions {
            let cell = record.get(idx).unwrap_or("");
            if column == TIMESTAMP_COLUMN {
                match parse_timestamp(cell) {
                    Some(ts) => reading.measurement_timestamp = Some(ts),
                    None => {
                        summary.bad_timestamps += 1;
                        continue 'records;
                    }
                }
            } else {
                let Some(value) = parse_field(cell) else {
                    summary.incomplete_rows += 1;
                    continue 'records;
                };
                if let Some(slot) = reading.slot_mut(column) {
                    *slot = Some(value);
                }
            }
        }
        rows.push(reading);
    }

    rows.sort_by_key(|r| r.measurement_timestamp);
    summary.rows_kept = rows.len();

    debug!(
        component = %Component::Dataset,
        rows_read = summary.rows_read,
        bad_timestamps = summary.bad_timestamps,
        incomplete_rows = summary.incomplete_rows,
        "raw table cleaned"
    );

    Ok((rows, summary))
}

/// Write the canonical processed table, creating parent directories.
pub fn write_table(path: &Path, rows: &[SensorReading]) -> Result<(), ThreatError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(PROCESSED_COLUMNS)?;
    for row in rows {
        let record: Vec<String> = PROCESSED_COLUMNS
            .iter()
            .map(|column| {
                if *column == TIMESTAMP_COLUMN {
                    row.measurement_timestamp
                        .map(|t| t.format(ISO_FORMAT).to_string())
                        .unwrap_or_default()
                } else {
                    row.value_of(column).map(|v| v.to_string()).unwrap_or_default()
                }
            })
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Run the whole pass: raw CSV at `input` → processed CSV at `output`.
pub fn prepare_file(input: &Path, output: &Path) -> Result<PrepSummary, ThreatError> {
    info!(component = %Component::Dataset, input = %input.display(), "loading raw dataset");
    let file = File::open(input).map_err(|e| {
        ThreatError::DataUnavailable(format!("cannot open {}: {}", input.display(), e))
    })?;

    let (rows, summary) = prepare_table(file)?;
    write_table(output, &rows)?;

    info!(
        component = %Component::Dataset,
        output = %output.display(),
        kept = summary.rows_kept,
        dropped = summary.rows_read - summary.rows_kept,
        "processed dataset saved"
    );
    Ok(summary)
}
