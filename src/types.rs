// src/types.rs
use std::path::PathBuf;

use crate::las::PointRecord;

// 绘图边距: 轴前 25, 轴后 10
pub const LEADING_MARGIN: i64 = 25;
pub const TRAILING_MARGIN: i64 = 10;

/// Plot extents of one waveform, padded for axes and labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
    pub range_x: i64,
    pub range_y: i64,
    /// Sample count (unpadded X extent).
    pub length: i64,
    /// 2^bits_per_sample (unpadded Y extent).
    pub height: i64,
}

impl Bounds {
    pub fn for_waveform(length: usize, bits_per_sample: u8) -> Self {
        let length = length as i64;
        let height = 1i64 << bits_per_sample.min(62);
        let (min_x, max_x) = (-LEADING_MARGIN, length + TRAILING_MARGIN);
        let (min_y, max_y) = (-LEADING_MARGIN, height + TRAILING_MARGIN);
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            range_x: max_x - min_x,
            range_y: max_y - min_y,
            length,
            height,
        }
    }
}

/// Decoded samples of one point's waveform packet. Built once, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    pub samples: Vec<u32>,
    pub bounds: Bounds,
    pub bits_per_sample: u8,
    pub temporal_spacing: u32,
    /// Sample index of the detected return.
    pub return_bin: usize,
}

/// Where a snapshot came from, for the status rows.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub record_number: u32,
    pub version_minor: u8,
    pub point_data_format: u8,
    pub global_encoding: u16,
}

impl SourceInfo {
    pub fn adjusted_gps_time(&self) -> bool {
        self.global_encoding & crate::las::ENCODING_ADJUSTED_GPS_TIME != 0
    }
}

/// Everything the renderer needs for one selected point.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub waveform: Waveform,
    pub point: PointRecord,
    pub source: SourceInfo,
}

/// Pixel rectangle the plot is mapped into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const WHITE: Rgba = Rgba(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba(0, 0, 0, 255);
    pub const GREEN: Rgba = Rgba(0, 255, 0, 255);
    pub const GRAY: Rgba = Rgba(160, 160, 164, 255);
}
