//! Peak threat detection over a historical table.
//!
//! Scores every row and finds the most severe one. The highlight replay mode
//! centres its window on this row when no explicit peak index is configured.

use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::model::{SensorReading, ThreatAssessment, ThreatLevel};
use crate::parameters::find_parameter;
use crate::threat::score;

/// Per-level row counts plus the peak, for operator reports.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub level_counts: BTreeMap<ThreatLevel, usize>,
    pub peak_index: Option<usize>,
    pub peak: Option<ThreatAssessment>,
}

/// Index and assessment of the highest-scoring row.
///
/// Ties resolve to the earliest row. Returns `None` for an empty table.
pub fn find_peak_index(
    rows: &[SensorReading],
    config: &ScoringConfig,
) -> Option<(usize, ThreatAssessment)> {
    let mut best: Option<(usize, ThreatAssessment)> = None;
    for (idx, row) in rows.iter().enumerate() {
        let assessment = score(row, config);
        let better = match &best {
            Some((_, current)) => assessment.score > current.score,
            None => true,
        };
        if better {
            best = Some((idx, assessment));
        }
    }
    best
}

/// Score the whole table and count rows per level.
pub fn summarize(rows: &[SensorReading], config: &ScoringConfig) -> DatasetSummary {
    let mut level_counts: BTreeMap<ThreatLevel, usize> =
        ThreatLevel::ALL.iter().map(|l| (*l, 0)).collect();
    for row in rows {
        *level_counts.entry(score(row, config).level).or_default() += 1;
    }

    let (peak_index, peak) = match find_peak_index(rows, config) {
        Some((idx, assessment)) => (Some(idx), Some(assessment)),
        None => (None, None),
    };

    DatasetSummary {
        rows: rows.len(),
        level_counts,
        peak_index,
        peak,
    }
}

/// One line per scored parameter of an assessment: value, unit and risk.
///
/// Units come from the built-in registry; parameters it does not know are
/// printed without one.
pub fn parameter_breakdown(assessment: &ThreatAssessment) -> Vec<String> {
    assessment
        .parameters
        .iter()
        .map(|(name, risk)| {
            let unit = find_parameter(name).map(|p| p.unit).unwrap_or("");
            let value = match assessment.raw.value_of(name) {
                Some(v) => format!("{} {}", v, unit).trim_end().to_string(),
                None => "n/a".to_string(),
            };
            format!("{:<20} {:<14} {}", name, value, risk.label())
        })
        .collect()
}

/// Print a summary block to stdout for the `find-peak` command.
pub fn print_summary(summary: &DatasetSummary) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("🌊 PEAK THREAT SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!("Records analysed: {}", summary.rows);
    for (level, count) in &summary.level_counts {
        println!("  {:<8} {}", level.label(), count);
    }
    match (&summary.peak_index, &summary.peak) {
        (Some(idx), Some(peak)) => {
            println!();
            println!("Highest threat score: {:.2} ({})", peak.score, peak.level);
            println!("Index in table:       {}", idx);
            if let Some(ts) = peak.raw.measurement_timestamp {
                println!("Timestamp:            {}", ts);
            }
            println!();
            for line in parameter_breakdown(peak) {
                println!("  {}", line);
            }
        }
        _ => println!("\nNo readings to analyse."),
    }
    println!("═══════════════════════════════════════════════════════════");
}
