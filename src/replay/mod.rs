//! Replay of historical readings as a live-looking threat feed.
//!
//! `sequence` decides which readings are played and in what order;
//! `engine` paces them out as scored assessments.

pub mod engine;
pub mod sequence;

pub use engine::{CancelSignal, ReplayEngine, ReplayStream};
pub use sequence::{ReplayMode, ReplayOptions, ReplaySequence};
