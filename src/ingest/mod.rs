/// Dataset input for the coastal threat service.
///
/// Submodules:
/// - `table`: reads the canonical processed table into `SensorReading`s.
/// - `prep`: cleans a raw weather export into that canonical table.

pub mod prep;
pub mod table;
