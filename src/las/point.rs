use std::io::{Read, Seek, SeekFrom};

use crate::las::endian::{f32_at, f64_at, i16_at, u16_at, u64_at, u32_at};
use crate::las::header::LasHeader;
use crate::las::ExtractError;

/// Bytes each point data format needs at minimum (formats 0..=10).
const RECORD_LEN: [usize; 11] = [20, 28, 26, 34, 57, 63, 30, 36, 38, 59, 67];

/// Waveform packet reference carried by formats 4, 5, 9 and 10.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointWaveformRef {
    pub descriptor_index: u8,
    pub byte_offset: u64,
    pub packet_size: u32,
    /// Picoseconds from the first sample to the detected return.
    pub return_point_location: f32,
    pub xt: f32,
    pub yt: f32,
    pub zt: f32,
}

/// One decoded point record. Optional fields are absent when the format lacks them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointRecord {
    pub format: u8,
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub synthetic: bool,
    pub keypoint: bool,
    pub withheld: bool,
    pub overlap: bool,
    pub scanner_channel: Option<u8>,
    pub scan_direction: bool,
    pub edge_of_flight_line: bool,
    pub classification: u8,
    pub user_data: u8,
    pub scan_angle: i16,
    pub point_source_id: u16,
    pub gps_time: Option<f64>,
    pub rgb: Option<[u16; 3]>,
    pub nir: Option<u16>,
    pub waveform: Option<PointWaveformRef>,
}

pub fn record_len(format: u8) -> Option<usize> {
    RECORD_LEN.get(usize::from(format)).copied()
}

pub fn carries_waveform(format: u8) -> bool {
    matches!(format, 4 | 5 | 9 | 10)
}

pub fn carries_rgb(format: u8) -> bool {
    matches!(format, 2 | 3 | 5 | 7 | 8 | 10)
}

pub fn carries_nir(format: u8) -> bool {
    matches!(format, 8 | 10)
}

pub fn carries_gps_time(format: u8) -> bool {
    !matches!(format, 0 | 2)
}

impl PointRecord {
    pub fn decode(format: u8, buf: &[u8]) -> Result<Self, ExtractError> {
        let need = record_len(format).ok_or_else(|| {
            ExtractError::InvalidHeader(format!("unknown point data format {format}"))
        })?;
        if buf.len() < need {
            return Err(ExtractError::InvalidHeader(format!(
                "point record is {} bytes, format {format} needs {need}",
                buf.len()
            )));
        }
        let mut point = PointRecord {
            format,
            intensity: u16_at(buf, 12),
            ..Default::default()
        };
        // offsets of the optional blocks that follow the core fields
        let (gps_at, rgb_at, nir_at, wave_at) = if format < 6 {
            point.decode_legacy_core(buf);
            let gps = carries_gps_time(format).then_some(20);
            let rgb = match format {
                2 => Some(20),
                3 | 5 => Some(28),
                _ => None,
            };
            let wave = match format {
                4 => Some(28),
                5 => Some(34),
                _ => None,
            };
            (gps, rgb, None, wave)
        } else {
            point.decode_extended_core(buf);
            let rgb = carries_rgb(format).then_some(30);
            let nir = carries_nir(format).then_some(36);
            let wave = match format {
                9 => Some(30),
                10 => Some(38),
                _ => None,
            };
            (Some(22), rgb, nir, wave)
        };
        point.gps_time = gps_at.map(|at| f64_at(buf, at));
        point.rgb = rgb_at.map(|at| [u16_at(buf, at), u16_at(buf, at + 2), u16_at(buf, at + 4)]);
        point.nir = nir_at.map(|at| u16_at(buf, at));
        point.waveform = wave_at.map(|at| PointWaveformRef {
            descriptor_index: buf[at],
            byte_offset: u64_at(buf, at + 1),
            packet_size: u32_at(buf, at + 9),
            return_point_location: f32_at(buf, at + 13),
            xt: f32_at(buf, at + 17),
            yt: f32_at(buf, at + 21),
            zt: f32_at(buf, at + 25),
        });
        Ok(point)
    }

    fn decode_legacy_core(&mut self, buf: &[u8]) {
        let returns = buf[14];
        self.return_number = returns & 0x07;
        self.number_of_returns = (returns >> 3) & 0x07;
        self.scan_direction = returns & 0x40 != 0;
        self.edge_of_flight_line = returns & 0x80 != 0;
        let class = buf[15];
        self.classification = class & 0x1f;
        self.synthetic = class & 0x20 != 0;
        self.keypoint = class & 0x40 != 0;
        self.withheld = class & 0x80 != 0;
        self.scan_angle = i16::from(buf[16] as i8);
        self.user_data = buf[17];
        self.point_source_id = u16_at(buf, 18);
    }

    fn decode_extended_core(&mut self, buf: &[u8]) {
        let returns = buf[14];
        self.return_number = returns & 0x0f;
        self.number_of_returns = returns >> 4;
        let flags = buf[15];
        self.synthetic = flags & 0x01 != 0;
        self.keypoint = flags & 0x02 != 0;
        self.withheld = flags & 0x04 != 0;
        self.overlap = flags & 0x08 != 0;
        self.scanner_channel = Some((flags >> 4) & 0x03);
        self.scan_direction = flags & 0x40 != 0;
        self.edge_of_flight_line = flags & 0x80 != 0;
        self.classification = buf[16];
        self.user_data = buf[17];
        self.scan_angle = i16_at(buf, 18);
        self.point_source_id = u16_at(buf, 20);
    }
}

/// Reads the 1-based `record_number` from the point array.
pub fn read_point<R: Read + Seek>(
    reader: &mut R,
    header: &LasHeader,
    record_number: u32,
) -> Result<PointRecord, ExtractError> {
    if record_number == 0 || u64::from(record_number) > header.point_count {
        return Err(ExtractError::PointOutOfRange {
            record: record_number,
            count: header.point_count,
        });
    }
    let stride = u64::from(header.point_record_length);
    let pos = u64::from(header.offset_to_point_data) + u64::from(record_number - 1) * stride;
    let mut buf = vec![0u8; usize::from(header.point_record_length)];
    reader.seek(SeekFrom::Start(pos))?;
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ExtractError::InvalidHeader(format!("point record {record_number} is truncated"))
        } else {
            ExtractError::Io(e)
        }
    })?;
    PointRecord::decode(header.point_data_format, &buf)
}
