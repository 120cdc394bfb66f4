// src/status.rs
//
// 状态栏: 每次发布后重新生成的八行字段，格式不携带的字段显示 N/A。
use chrono::{DateTime, Timelike};

use crate::las::point::{carries_gps_time, carries_nir, carries_rgb, carries_waveform};
use crate::types::Snapshot;

/// Seconds between the POSIX epoch and the GPS epoch (1980-01-06).
const GPS_EPOCH: f64 = 315_964_800.0;
/// Adjusted standard GPS time is GPS week time minus 1e9.
const ADJUSTED_GPS_OFFSET: f64 = 1_000_000_000.0;
/// GPS - UTC before the first boundary below.
const BASE_LEAP_SECONDS: f64 = 13.0;
/// UTC instants after which one more leap second applies.
const LEAP_BOUNDARIES: [i64; 4] = [1_136_073_599, 1_230_767_999, 1_341_100_799, 1_435_708_799];

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusField {
    pub label: &'static str,
    pub value: String,
}

impl StatusField {
    fn new(label: &'static str, value: impl ToString) -> Self {
        Self {
            label,
            value: value.to_string(),
        }
    }

    fn when(label: &'static str, present: bool, value: impl FnOnce() -> String) -> Self {
        Self {
            label,
            value: if present {
                value()
            } else {
                NOT_AVAILABLE.to_string()
            },
        }
    }
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.label, self.value)
    }
}

/// Leap seconds added on top of the base offset at `posix` (boundaries inclusive).
pub fn leap_seconds(posix: i64) -> u32 {
    LEAP_BOUNDARIES.iter().filter(|&&b| posix >= b).count() as u32
}

/// GPS - UTC in seconds at `posix`.
pub fn gps_utc_offset(posix: i64) -> f64 {
    BASE_LEAP_SECONDS + f64::from(leap_seconds(posix))
}

pub fn adjusted_gps_to_posix(adjusted: f64) -> f64 {
    let gps = adjusted + GPS_EPOCH + ADJUSTED_GPS_OFFSET;
    // the table is keyed by UTC, look it up with the base offset applied
    gps - gps_utc_offset((gps - BASE_LEAP_SECONDS) as i64)
}

/// `YYYY-MM-DD (DDD) HH:MM:SS.ss` in UTC.
pub fn format_adjusted_gps(adjusted: f64) -> String {
    let micros = (adjusted_gps_to_posix(adjusted) * 1_000_000.0) as i64;
    let (secs, frac) = (micros.div_euclid(1_000_000), micros.rem_euclid(1_000_000));
    match DateTime::from_timestamp(secs, 0) {
        Some(t) => {
            let second = f64::from(t.second()) + frac as f64 / 1_000_000.0;
            format!("{}{:05.2}", t.format("%Y-%m-%d (%j) %H:%M:"), second)
        }
        None => format!("{adjusted:.6}"),
    }
}

/// The eight status rows for one snapshot.
pub fn status_rows(snapshot: &Snapshot) -> Vec<Vec<StatusField>> {
    let p = &snapshot.point;
    let format = snapshot.source.point_data_format;
    let flag = |b: bool| u8::from(b);

    let time = match p.gps_time {
        Some(t) if carries_gps_time(format) && snapshot.source.adjusted_gps_time() => {
            StatusField::new("Date/time", format_adjusted_gps(t))
        }
        Some(t) if carries_gps_time(format) => StatusField::new("GPS seconds", format!("{t:.6}")),
        _ => StatusField::new("Date/time", NOT_AVAILABLE),
    };

    let rgb = p.rgb.filter(|_| carries_rgb(format));
    let wave = p.waveform.filter(|_| carries_waveform(format));
    let channel = |i: usize| move || rgb.map(|c| c[i].to_string()).unwrap_or_default();
    let w = wave.unwrap_or_default();

    vec![
        vec![
            time,
            StatusField::new("Intensity", p.intensity),
            StatusField::new("Return", p.return_number),
        ],
        vec![
            StatusField::new("Number of returns", p.number_of_returns),
            StatusField::new("Synthetic", flag(p.synthetic)),
            StatusField::new("Keypoint", flag(p.keypoint)),
            StatusField::new("Withheld", flag(p.withheld)),
            StatusField::new("Overlap", flag(p.overlap)),
        ],
        vec![
            StatusField::when("Scanner channel", format > 5, || {
                p.scanner_channel.unwrap_or_default().to_string()
            }),
            StatusField::new("Scan direction flag", flag(p.scan_direction)),
            StatusField::new("Edge of flightline flag", flag(p.edge_of_flight_line)),
        ],
        vec![
            StatusField::new("Classification", p.classification),
            StatusField::new("User data", p.user_data),
            StatusField::new("Scan angle", p.scan_angle),
        ],
        vec![
            StatusField::new("Point source ID", p.point_source_id),
            StatusField::when("Red", rgb.is_some(), channel(0)),
            StatusField::when("Green", rgb.is_some(), channel(1)),
            StatusField::when("Blue", rgb.is_some(), channel(2)),
            StatusField::when("NIR", carries_nir(format) && p.nir.is_some(), || {
                p.nir.unwrap_or_default().to_string()
            }),
        ],
        vec![
            StatusField::when("Waveform descriptor index", wave.is_some(), || {
                w.descriptor_index.to_string()
            }),
            StatusField::when("Byte offset to waveforms", wave.is_some(), || {
                w.byte_offset.to_string()
            }),
        ],
        vec![
            StatusField::when("Waveform packet size", wave.is_some(), || {
                w.packet_size.to_string()
            }),
            StatusField::when("Return point waveform location", wave.is_some(), || {
                format!("{:.2}", w.return_point_location)
            }),
        ],
        vec![
            StatusField::when("X(t)", wave.is_some(), || format!("{:.11}", w.xt)),
            StatusField::when("Y(t)", wave.is_some(), || format!("{:.11}", w.yt)),
            StatusField::when("Z(t)", wave.is_some(), || format!("{:.11}", w.zt)),
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::las::point::PointWaveformRef;
    use crate::las::PointRecord;
    use crate::types::{Bounds, SourceInfo, Waveform};
    use std::path::PathBuf;

    fn snapshot(format: u8, encoding: u16, point: PointRecord) -> Snapshot {
        Snapshot {
            waveform: Waveform {
                samples: vec![0; 4],
                bounds: Bounds::for_waveform(4, 8),
                bits_per_sample: 8,
                temporal_spacing: 1,
                return_bin: 0,
            },
            point,
            source: SourceInfo {
                path: PathBuf::from("a.las"),
                record_number: 1,
                version_minor: 4,
                point_data_format: format,
                global_encoding: encoding,
            },
        }
    }

    fn field<'a>(rows: &'a [Vec<StatusField>], label: &str) -> &'a str {
        rows.iter()
            .flatten()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
            .unwrap()
    }

    #[test]
    fn leap_boundaries_are_inclusive() {
        assert_eq!(leap_seconds(1_136_073_598), 0);
        assert_eq!(leap_seconds(1_136_073_599), 1);
        assert_eq!(leap_seconds(1_230_767_998), 1);
        assert_eq!(leap_seconds(1_230_767_999), 2);
        assert_eq!(gps_utc_offset(1_230_767_998), 14.0);
        assert_eq!(gps_utc_offset(1_230_767_999), 15.0);
        assert_eq!(gps_utc_offset(1_500_000_000), 17.0);
        assert_eq!(gps_utc_offset(0), 13.0);
    }

    #[test]
    fn adjusted_time_at_the_2008_boundary() {
        // lands exactly on 1230767999 before correction
        let adjusted = 1_230_767_999.0 - GPS_EPOCH - ADJUSTED_GPS_OFFSET + BASE_LEAP_SECONDS;
        assert_eq!(adjusted, -85_196_788.0);
        assert_eq!(adjusted_gps_to_posix(adjusted), 1_230_767_997.0);
        assert_eq!(format_adjusted_gps(adjusted), "2008-12-31 (366) 23:59:57.00");
        assert_eq!(format_adjusted_gps(adjusted + 0.25), "2008-12-31 (366) 23:59:57.25");
    }

    #[test]
    fn eight_rows_in_the_usual_order() {
        let rows = status_rows(&snapshot(1, 0, PointRecord::default()));
        let sizes: Vec<usize> = rows.iter().map(Vec::len).collect();
        assert_eq!(sizes, [3, 5, 3, 3, 5, 2, 2, 3]);
        assert_eq!(rows[0][1].to_string(), "Intensity : 0");
    }

    #[test]
    fn gps_seconds_without_adjusted_flag() {
        let point = PointRecord {
            gps_time: Some(12.5),
            ..PointRecord::default()
        };
        let rows = status_rows(&snapshot(1, 0, point.clone()));
        assert_eq!(rows[0][0].label, "GPS seconds");
        assert_eq!(rows[0][0].value, "12.500000");

        let rows = status_rows(&snapshot(0, 0, PointRecord { gps_time: None, ..point }));
        assert_eq!(field(&rows, "Date/time"), NOT_AVAILABLE);
    }

    #[test]
    fn format_dependent_fields() {
        let point = PointRecord {
            scanner_channel: Some(3),
            rgb: Some([10, 20, 30]),
            nir: Some(40),
            waveform: Some(PointWaveformRef {
                descriptor_index: 2,
                byte_offset: 1000,
                packet_size: 200,
                return_point_location: 50.0,
                xt: 0.25,
                yt: -0.5,
                zt: 1.0,
            }),
            ..PointRecord::default()
        };
        let rows = status_rows(&snapshot(10, 3, point.clone()));
        assert_eq!(field(&rows, "Scanner channel"), "3");
        assert_eq!(field(&rows, "Green"), "20");
        assert_eq!(field(&rows, "NIR"), "40");
        assert_eq!(field(&rows, "Byte offset to waveforms"), "1000");
        assert_eq!(field(&rows, "Return point waveform location"), "50.00");
        assert_eq!(field(&rows, "Y(t)"), "-0.50000000000");

        let rows = status_rows(&snapshot(
            4,
            2,
            PointRecord {
                scanner_channel: None,
                rgb: None,
                nir: None,
                ..point
            },
        ));
        assert_eq!(field(&rows, "Scanner channel"), NOT_AVAILABLE);
        assert_eq!(field(&rows, "Red"), NOT_AVAILABLE);
        assert_eq!(field(&rows, "NIR"), NOT_AVAILABLE);
        assert_eq!(field(&rows, "Waveform descriptor index"), "2");

        let rows = status_rows(&snapshot(6, 0, PointRecord::default()));
        assert_eq!(field(&rows, "Scanner channel"), "0");
        assert_eq!(field(&rows, "Z(t)"), NOT_AVAILABLE);
    }
}
