//! Replay sequence construction.
//!
//! A `ReplaySequence` is the finite, immutable list of readings a replay
//! stream walks through. It is built once when a stream source is opened and
//! shared read-only (`Arc<[SensorReading]>`) by every stream using it.
//!
//! # Modes
//! - `Full`: the whole table, oldest first.
//! - `Highlight`: a demo cut. A window of `window_length` rows centred on a
//!   peak index, with a short calm prologue taken from the start of the
//!   table spliced in front:
//!
//! ```text
//! [ rows 0..calm_length ] ++ [ rows peak - w/2 .. peak + w/2 ]
//! ```
//!
//!   The splice is deliberately discontinuous in time: the prologue shows
//!   quiet conditions before the storm, whatever date it came from.

use std::ops::Range;
use std::sync::Arc;

use crate::analysis::peak::find_peak_index;
use crate::config::ScoringConfig;
use crate::model::{SensorReading, ThreatError};

/// Which part of the table to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    Full,
    Highlight,
}

/// How to cut a replay sequence from a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    pub mode: ReplayMode,
    /// Wrap to the first reading after the last instead of ending.
    pub looping: bool,
    /// Centre of the highlight window. `None` picks the highest-scoring row.
    pub peak_index: Option<usize>,
    pub window_length: usize,
    pub calm_length: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            mode: ReplayMode::Full,
            looping: false,
            peak_index: None,
            window_length: 60,
            calm_length: 10,
        }
    }
}

/// Ordered readings for a replay stream.
#[derive(Debug, Clone)]
pub struct ReplaySequence {
    readings: Arc<[SensorReading]>,
    looping: bool,
}

impl ReplaySequence {
    /// Wrap already-ordered readings. An empty list is `DataUnavailable`.
    pub fn new(readings: Vec<SensorReading>, looping: bool) -> Result<Self, ThreatError> {
        if readings.is_empty() {
            return Err(ThreatError::DataUnavailable(
                "replay sequence has no readings".into(),
            ));
        }
        Ok(Self {
            readings: readings.into(),
            looping,
        })
    }

    /// Build a sequence from a loaded table according to `options`.
    ///
    /// `config` is only consulted in highlight mode when no peak index is
    /// given, to locate the highest-scoring row.
    pub fn build(
        mut table: Vec<SensorReading>,
        options: &ReplayOptions,
        config: &ScoringConfig,
    ) -> Result<Self, ThreatError> {
        if table.is_empty() {
            return Err(ThreatError::DataUnavailable("dataset has no readings".into()));
        }
        order_table(&mut table);

        match options.mode {
            ReplayMode::Full => Self::new(table, options.looping),
            ReplayMode::Highlight => {
                if options.window_length == 0 {
                    return Err(ThreatError::Config(
                        "highlight window length must be at least 1".into(),
                    ));
                }
                let peak = match options.peak_index {
                    Some(idx) => idx,
                    None => find_peak_index(&table, config)
                        .map(|(idx, _)| idx)
                        .unwrap_or(table.len()),
                };

                let window = highlight_window(table.len(), peak, options.window_length);
                let calm = 0..options.calm_length.min(table.len());

                let mut readings = Vec::with_capacity(calm.len() + window.len());
                readings.extend_from_slice(&table[calm]);
                readings.extend_from_slice(&table[window]);
                Self::new(readings, options.looping)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Always `false` for a constructed sequence; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn get(&self, position: usize) -> Option<&SensorReading> {
        self.readings.get(position)
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    /// Position after `position`: wraps to 0 when looping, `None` at the end
    /// of a non-looping sequence.
    pub fn next_position(&self, position: usize) -> Option<usize> {
        let next = position + 1;
        if next < self.readings.len() {
            Some(next)
        } else if self.looping {
            Some(0)
        } else {
            None
        }
    }

}

/// Put a table into replay order.
///
/// If every row carries a timestamp the table is stable-sorted by it;
/// otherwise file order is kept.
pub fn order_table(table: &mut [SensorReading]) {
    if table.iter().all(|r| r.measurement_timestamp.is_some()) {
        table.sort_by_key(|r| r.measurement_timestamp);
    }
}

/// Index range of the highlight window.
///
/// `[peak - w/2, peak + w/2)` clamped to `[0, len)`. An out-of-range peak
/// falls back to the last `w` rows.
pub fn highlight_window(len: usize, peak: usize, window_length: usize) -> Range<usize> {
    if peak >= len {
        return len.saturating_sub(window_length)..len;
    }
    let half = window_length / 2;
    let start = peak.saturating_sub(half);
    let end = peak.saturating_add(half).min(len);
    start..end
}
