// LAS 1.3 / 1.4 point files and their digitized waveform packets.
pub mod descriptor;
pub mod endian;
pub mod error;
pub mod extract;
pub mod header;
pub mod point;

#[cfg(test)]
pub(crate) mod fixture;

pub use error::ExtractError;
pub use extract::{Extraction, NoWaveformsReason, WaveformExtractor};
pub use header::ENCODING_ADJUSTED_GPS_TIME;
pub use point::PointRecord;
