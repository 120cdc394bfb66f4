use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot open {}: {source}", path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported LAS version {major}.{minor} (need 1.3 or 1.4)")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("invalid LAS header: {0}")]
    InvalidHeader(String),
    #[error("malformed waveform descriptor {index}: {reason}")]
    MalformedDescriptor { index: u8, reason: String },
    #[error("no waveform descriptor registered for index {0}")]
    MissingDescriptor(u8),
    #[error("waveform descriptor {index} uses compression type {kind}; only uncompressed packets are supported")]
    UnsupportedCompression { index: u8, kind: u8 },
    #[error("point record {record} out of range (file holds {count} points)")]
    PointOutOfRange { record: u32, count: u64 },
    #[error("waveform truncated: need {needed} bytes, only {available} available")]
    TruncatedWaveform { needed: u64, available: u64 },
    #[error("return point bin {bin} outside waveform of {len} samples")]
    ReturnOutOfRange { bin: i64, len: usize },
    #[error("unable to allocate a buffer for {samples} samples")]
    ResourceExhausted { samples: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Only allocation failure ends the process; everything else is surfaced and the
    /// previous snapshot stays on screen.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractError::ResourceExhausted { .. })
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::FileUnavailable {
            path: path.into(),
            source,
        }
    }
}
