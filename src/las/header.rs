use std::io::{Read, Seek, SeekFrom};

use crate::las::endian::{u16_at, u32_at, u64_at};
use crate::las::ExtractError;

const SIGNATURE: &[u8; 4] = b"LASF";

/// Shortest public header we accept (LAS 1.0 - 1.2).
const MIN_HEADER_LEN: usize = 227;
const HEADER_LEN_V13: usize = 235;
const HEADER_LEN_V14: usize = 375;
pub const VLR_HEADER_LEN: usize = 54;

/// Global encoding bits.
pub const ENCODING_ADJUSTED_GPS_TIME: u16 = 0x1;
pub const ENCODING_WAVEFORMS_INTERNAL: u16 = 0x2;
pub const ENCODING_WAVEFORMS_EXTERNAL: u16 = 0x4;

/// Public header block fields this viewer cares about.
#[derive(Clone, Debug, PartialEq)]
pub struct LasHeader {
    pub global_encoding: u16,
    pub version_major: u8,
    pub version_minor: u8,
    pub header_size: u16,
    pub offset_to_point_data: u32,
    pub number_of_vlrs: u32,
    pub point_data_format: u8,
    pub point_record_length: u16,
    pub point_count: u64,
    pub start_of_waveform_data: u64,
}

/// Variable-length record as stored after the public header.
#[derive(Clone, Debug, PartialEq)]
pub struct Vlr {
    pub user_id: String,
    pub record_id: u16,
    pub payload: Vec<u8>,
}

impl LasHeader {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, ExtractError> {
        reader.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; HEADER_LEN_V14];
        let got = read_up_to(reader, &mut buf)?;
        if got < MIN_HEADER_LEN {
            return Err(ExtractError::InvalidHeader(format!(
                "file is only {got} bytes, shorter than a public header"
            )));
        }
        if &buf[0..4] != SIGNATURE {
            return Err(ExtractError::InvalidHeader("missing LASF signature".into()));
        }
        let header_size = u16_at(&buf, 94);
        if usize::from(header_size) < MIN_HEADER_LEN
            || got < usize::from(header_size).min(HEADER_LEN_V14)
        {
            return Err(ExtractError::InvalidHeader(format!(
                "declared header size {header_size} does not fit a {got} byte file"
            )));
        }
        let version_minor = buf[25];
        let declared = usize::from(header_size).min(got);
        let start_of_waveform_data = if version_minor >= 3 && declared >= HEADER_LEN_V13 {
            u64_at(&buf, 227)
        } else {
            0
        };
        let legacy_count = u64::from(u32_at(&buf, 107));
        let point_count = if version_minor >= 4 && declared >= HEADER_LEN_V14 {
            match u64_at(&buf, 247) {
                0 => legacy_count,
                n => n,
            }
        } else {
            legacy_count
        };
        Ok(Self {
            global_encoding: u16_at(&buf, 6),
            version_major: buf[24],
            version_minor,
            header_size,
            offset_to_point_data: u32_at(&buf, 96),
            number_of_vlrs: u32_at(&buf, 100),
            // the two high bits flag LAZ compression
            point_data_format: buf[104] & 0x3f,
            point_record_length: u16_at(&buf, 105),
            point_count,
            start_of_waveform_data,
        })
    }

    pub fn has_waveforms(&self) -> bool {
        self.global_encoding & (ENCODING_WAVEFORMS_INTERNAL | ENCODING_WAVEFORMS_EXTERNAL) != 0
    }

    pub fn waveforms_external(&self) -> bool {
        self.global_encoding & ENCODING_WAVEFORMS_EXTERNAL != 0
    }

    /// Reads every VLR that follows the public header.
    pub fn read_vlrs<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Vlr>, ExtractError> {
        reader.seek(SeekFrom::Start(u64::from(self.header_size)))?;
        let mut records = Vec::with_capacity(self.number_of_vlrs.min(1024) as usize);
        for i in 0..self.number_of_vlrs {
            let mut head = [0u8; VLR_HEADER_LEN];
            reader.read_exact(&mut head).map_err(|e| truncated_vlr(i, e))?;
            let user_id = String::from_utf8_lossy(&head[2..18])
                .trim_end_matches('\0')
                .to_string();
            let record_id = u16_at(&head, 18);
            let len = usize::from(u16_at(&head, 20));
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload).map_err(|e| truncated_vlr(i, e))?;
            log::trace!("vlr {i}: user '{user_id}' id {record_id} ({len} bytes)");
            records.push(Vlr {
                user_id,
                record_id,
                payload,
            });
        }
        Ok(records)
    }
}

fn truncated_vlr(index: u32, err: std::io::Error) -> ExtractError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ExtractError::InvalidHeader(format!("variable length record {index} is truncated"))
    } else {
        ExtractError::Io(err)
    }
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::las::fixture::LasFixture;

    use std::io::Cursor;

    #[test]
    fn decodes_v14_header_and_vlrs() {
        let mut fixture = LasFixture::new(4, ENCODING_WAVEFORMS_INTERNAL, 4);
        fixture.add_vlr(101, vec![8, 0, 200, 0, 0, 0, 1, 0, 0, 0]);
        fixture.add_vlr(7, vec![1, 2, 3]);
        let mut cursor = Cursor::new(fixture.to_las_bytes());
        let header = LasHeader::read(&mut cursor).unwrap();
        assert_eq!(header.version_major, 1);
        assert_eq!(header.version_minor, 4);
        assert_eq!(header.header_size, 375);
        assert_eq!(header.point_data_format, 4);
        assert_eq!(header.number_of_vlrs, 2);
        assert!(header.has_waveforms());
        assert!(!header.waveforms_external());
        let vlrs = header.read_vlrs(&mut cursor).unwrap();
        assert_eq!(vlrs.len(), 2);
        assert_eq!(vlrs[0].record_id, 101);
        assert_eq!(vlrs[0].user_id, "LASF_Spec");
        assert_eq!(vlrs[1].payload, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_missing_signature() {
        let mut bytes = LasFixture::new(3, 0, 1).to_las_bytes();
        bytes[0] = b'X';
        let err = LasHeader::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidHeader(_)));
    }

    #[test]
    fn truncated_vlr_list_is_reported() {
        let mut fixture = LasFixture::new(3, ENCODING_WAVEFORMS_INTERNAL, 4);
        fixture.add_vlr(100, vec![0; 26]);
        let mut bytes = fixture.to_las_bytes();
        bytes.truncate(235 + VLR_HEADER_LEN + 10);
        let mut cursor = Cursor::new(bytes);
        let header = LasHeader::read(&mut cursor).unwrap();
        let err = header.read_vlrs(&mut cursor).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidHeader(_)));
    }
}
