/// Dataset preparation integration tests
///
/// Tests verify:
/// 1. A raw station export is cleaned into the processed table on disk
/// 2. The processed table loads back through the same reader the service uses
/// 3. The peak of the prepared table is found after cleaning
///
/// Run with: cargo test --test dataset_prep

use std::fs;

use coastal_threat_service::analysis::peak::{find_peak_index, summarize};
use coastal_threat_service::config::ScoringConfig;
use coastal_threat_service::ingest::prep::{prepare_file, PROCESSED_COLUMNS};
use coastal_threat_service::ingest::table::{latest_reading, load_table};
use coastal_threat_service::model::{ThreatError, ThreatLevel};

const RAW_EXPORT: &str = "\
Station Name,Measurement Timestamp,Air Temperature,Wet Bulb Temperature,Humidity,Rain Intensity,Interval Rain,Total Rain,Wind Direction,Wind Speed,Maximum Wind Speed,Barometric Pressure,Solar Radiation,Heading,Battery Life
Porbandar Pier,08/30/2025 02:00:00 PM,27.1,23.0,96,16.0,4.0,12.0,210,36.0,48.0,982.0,90,0,12.0
Porbandar Pier,08/30/2025 10:00:00 AM,28.0,21.0,65,0.0,0.0,0.0,180,5.0,8.0,1009.0,610,0,12.1
Porbandar Pier,08/30/2025 12:00:00 PM,27.8,22.0,85,4.0,1.0,1.0,190,20.0,28.0,998.0,300,0,12.1
Porbandar Pier,,27.8,22.0,85,4.0,1.0,1.0,190,20.0,28.0,998.0,300,0,12.1
Porbandar Pier,08/30/2025 04:00:00 PM,26.5,22.5,90,,0.5,12.5,200,18.0,25.0,994.0,40,0,12.0
";

#[test]
fn test_prepare_file_writes_clean_sorted_table() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.csv");
    let output = dir.path().join("processed").join("cleaned_weather.csv");
    fs::write(&input, RAW_EXPORT).unwrap();

    let summary = prepare_file(&input, &output).expect("raw export should prepare");
    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.bad_timestamps, 1);
    assert_eq!(summary.incomplete_rows, 1);
    assert_eq!(summary.rows_kept, 3);

    let text = fs::read_to_string(&output).unwrap();
    let header = text.lines().next().unwrap();
    assert_eq!(header, PROCESSED_COLUMNS.join(","));

    let rows = load_table(&output).unwrap();
    let winds: Vec<Option<f64>> = rows.iter().map(|r| r.wind_speed).collect();
    assert_eq!(winds, vec![Some(5.0), Some(20.0), Some(36.0)], "rows sorted by time");

    let latest = latest_reading(&output).unwrap();
    assert_eq!(latest.barometric_pressure, Some(982.0));
}

#[test]
fn test_prepared_table_peak_is_the_storm_row() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.csv");
    let output = dir.path().join("cleaned_weather.csv");
    fs::write(&input, RAW_EXPORT).unwrap();
    prepare_file(&input, &output).unwrap();

    let rows = load_table(&output).unwrap();
    let config = ScoringConfig::builtin();
    let (idx, peak) = find_peak_index(&rows, &config).unwrap();
    assert_eq!(idx, 2);
    assert_eq!(peak.score, 100.0);
    assert_eq!(peak.level, ThreatLevel::Danger);

    let summary = summarize(&rows, &config);
    assert_eq!(summary.level_counts[&ThreatLevel::Danger], 1);
    assert_eq!(summary.rows, 3);
}

#[test]
fn test_missing_raw_file_is_data_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let result = prepare_file(&dir.path().join("absent.csv"), &dir.path().join("out.csv"));
    assert!(matches!(result, Err(ThreatError::DataUnavailable(_))));
}
