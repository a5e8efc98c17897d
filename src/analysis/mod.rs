/// Dataset analysis utilities for the coastal threat service.
///
/// Offline helpers that score a whole historical table rather than a single
/// reading. Used by the `find-peak` command and by highlight replay to
/// locate the storm peak.
///
/// Submodules:
/// - `peak`: finds the highest-scoring row and summarises levels.

pub mod peak;
