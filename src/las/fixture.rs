//! Synthetic LAS files for tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::las::header::VLR_HEADER_LEN;
use crate::las::point::record_len;

#[derive(Clone, Copy, Debug)]
pub struct WaveRef {
    pub index: u8,
    pub offset: u64,
    pub size: u32,
    pub return_location: f32,
}

impl WaveRef {
    pub fn new(index: u8, offset: u64, size: u32, return_location: f32) -> Self {
        Self {
            index,
            offset,
            size,
            return_location,
        }
    }
}

pub fn descriptor_payload(
    bits: u8,
    compression: u8,
    samples: u32,
    spacing: u32,
    gain: f64,
    offset: f64,
) -> Vec<u8> {
    let mut out = vec![bits, compression];
    out.extend_from_slice(&samples.to_le_bytes());
    out.extend_from_slice(&spacing.to_le_bytes());
    out.extend_from_slice(&gain.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out
}

/// Zeroed record of the given format with GPS time and waveform reference filled in.
pub fn point_record(format: u8, wave: Option<WaveRef>, gps_time: f64) -> Vec<u8> {
    let mut buf = vec![0u8; record_len(format).expect("known format")];
    buf[12..14].copy_from_slice(&321u16.to_le_bytes());
    let gps_at = match format {
        0 | 2 => None,
        1 | 3 | 4 | 5 => Some(20),
        _ => Some(22),
    };
    if let Some(at) = gps_at {
        buf[at..at + 8].copy_from_slice(&gps_time.to_le_bytes());
    }
    let wave_at = match format {
        4 => Some(28),
        5 => Some(34),
        9 => Some(30),
        10 => Some(38),
        _ => None,
    };
    if let (Some(at), Some(w)) = (wave_at, wave) {
        buf[at] = w.index;
        buf[at + 1..at + 9].copy_from_slice(&w.offset.to_le_bytes());
        buf[at + 9..at + 13].copy_from_slice(&w.size.to_le_bytes());
        buf[at + 13..at + 17].copy_from_slice(&w.return_location.to_le_bytes());
        buf[at + 17..at + 21].copy_from_slice(&0.25f32.to_le_bytes());
        buf[at + 21..at + 25].copy_from_slice(&(-0.5f32).to_le_bytes());
        buf[at + 25..at + 29].copy_from_slice(&1.0f32.to_le_bytes());
    }
    buf
}

/// Builder for a LAS 1.3/1.4 file. Waveform bytes are placed after the point array
/// (internal) or in the `.wdp` sibling (external), at the given packet offsets.
pub struct LasFixture {
    pub minor: u8,
    pub global_encoding: u16,
    pub point_format: u8,
    pub vlrs: Vec<(u16, Vec<u8>)>,
    pub points: Vec<Vec<u8>>,
    pub packets: Vec<(u64, Vec<u8>)>,
}

impl LasFixture {
    pub fn new(minor: u8, global_encoding: u16, point_format: u8) -> Self {
        Self {
            minor,
            global_encoding,
            point_format,
            vlrs: Vec::new(),
            points: Vec::new(),
            packets: Vec::new(),
        }
    }

    pub fn add_vlr(&mut self, record_id: u16, payload: Vec<u8>) -> &mut Self {
        self.vlrs.push((record_id, payload));
        self
    }

    pub fn add_point(&mut self, record: Vec<u8>) -> &mut Self {
        self.points.push(record);
        self
    }

    pub fn add_packet(&mut self, offset: u64, bytes: Vec<u8>) -> &mut Self {
        self.packets.push((offset, bytes));
        self
    }

    fn header_size(&self) -> usize {
        if self.minor >= 4 {
            375
        } else {
            235
        }
    }

    fn packet_area(&self) -> Vec<u8> {
        let end = self
            .packets
            .iter()
            .map(|(off, b)| *off as usize + b.len())
            .max()
            .unwrap_or(0);
        let mut area = vec![0u8; end];
        for (off, bytes) in &self.packets {
            area[*off as usize..*off as usize + bytes.len()].copy_from_slice(bytes);
        }
        area
    }

    pub fn to_las_bytes(&self) -> Vec<u8> {
        let header_size = self.header_size();
        let record_length = record_len(self.point_format).unwrap_or(20);
        let vlr_bytes: usize = self.vlrs.iter().map(|(_, p)| VLR_HEADER_LEN + p.len()).sum();
        let offset_to_points = header_size + vlr_bytes;
        let start_of_waveforms = offset_to_points + record_length * self.points.len();
        let mut out = vec![0u8; header_size];
        out[0..4].copy_from_slice(b"LASF");
        out[6..8].copy_from_slice(&self.global_encoding.to_le_bytes());
        out[24] = 1;
        out[25] = self.minor;
        out[94..96].copy_from_slice(&(header_size as u16).to_le_bytes());
        out[96..100].copy_from_slice(&(offset_to_points as u32).to_le_bytes());
        out[100..104].copy_from_slice(&(self.vlrs.len() as u32).to_le_bytes());
        out[104] = self.point_format;
        out[105..107].copy_from_slice(&(record_length as u16).to_le_bytes());
        out[107..111].copy_from_slice(&(self.points.len() as u32).to_le_bytes());
        let internal = self.global_encoding & 0x4 == 0 && !self.packets.is_empty();
        if internal {
            out[227..235].copy_from_slice(&(start_of_waveforms as u64).to_le_bytes());
        }
        if self.minor >= 4 {
            out[247..255].copy_from_slice(&(self.points.len() as u64).to_le_bytes());
        }
        for (record_id, payload) in &self.vlrs {
            let mut head = [0u8; VLR_HEADER_LEN];
            head[2..11].copy_from_slice(b"LASF_Spec");
            head[18..20].copy_from_slice(&record_id.to_le_bytes());
            head[20..22].copy_from_slice(&(payload.len() as u16).to_le_bytes());
            out.extend_from_slice(&head);
            out.extend_from_slice(payload);
        }
        for point in &self.points {
            let mut record = point.clone();
            record.resize(record_length, 0);
            out.extend_from_slice(&record);
        }
        if internal {
            out.extend_from_slice(&self.packet_area());
        }
        out
    }

    /// Writes the point file and, for external waveforms, its `.wdp` sibling.
    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.to_las_bytes()).expect("write las fixture");
        if self.global_encoding & 0x4 != 0 && !self.packets.is_empty() {
            std::fs::write(path.with_extension("wdp"), self.packet_area())
                .expect("write wdp fixture");
        }
    }
}

/// Fresh `points.<ext>` path in its own temp directory, removed when the `TempDir` drops.
pub fn temp_path(tag: &str, ext: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::Builder::new()
        .prefix(&format!("laswave_{tag}_"))
        .tempdir()
        .expect("create temp dir");
    let path = dir.path().join(format!("points.{ext}"));
    (dir, path)
}
