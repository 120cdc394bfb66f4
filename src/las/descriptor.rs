use crate::las::endian::{f64_at, u32_at};
use crate::las::header::Vlr;
use crate::las::ExtractError;

/// Record ids 100..=354 hold waveform packet descriptors 1..=255.
pub const FIRST_DESCRIPTOR_ID: u16 = 100;
pub const LAST_DESCRIPTOR_ID: u16 = 354;
const ID_TO_INDEX: u16 = 99;

/// Fixed payload size of a descriptor record.
pub const DESCRIPTOR_PAYLOAD_LEN: usize = 26;

/// How to interpret one class of digitized waveform packets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveformPacketDescriptor {
    pub bits_per_sample: u8,
    /// 0 is uncompressed; nothing else is decodable here.
    pub compression_type: u8,
    pub number_of_samples: u32,
    /// Picoseconds between consecutive samples.
    pub temporal_spacing: u32,
    pub digitizer_gain: f64,
    pub digitizer_offset: f64,
}

impl WaveformPacketDescriptor {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < DESCRIPTOR_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            bits_per_sample: payload[0],
            compression_type: payload[1],
            number_of_samples: u32_at(payload, 2),
            temporal_spacing: u32_at(payload, 6),
            digitizer_gain: f64_at(payload, 10),
            digitizer_offset: f64_at(payload, 18),
        })
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample).div_ceil(8)
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_type != 0
    }
}

/// Per-index descriptor lookup for one loaded file. Sparse: most slots are empty.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformDescriptorTable {
    slots: Vec<Option<WaveformPacketDescriptor>>,
}

impl Default for WaveformDescriptorTable {
    fn default() -> Self {
        Self {
            slots: vec![None; 256],
        }
    }
}

impl WaveformDescriptorTable {
    pub fn build(records: &[Vlr]) -> Result<Self, ExtractError> {
        let mut table = Self::default();
        for record in records {
            if !(FIRST_DESCRIPTOR_ID..=LAST_DESCRIPTOR_ID).contains(&record.record_id) {
                continue;
            }
            let index = (record.record_id - ID_TO_INDEX) as u8;
            let descriptor = WaveformPacketDescriptor::decode(&record.payload).ok_or_else(|| {
                ExtractError::MalformedDescriptor {
                    index,
                    reason: format!(
                        "payload is {} bytes, need {DESCRIPTOR_PAYLOAD_LEN}",
                        record.payload.len()
                    ),
                }
            })?;
            log::debug!(
                "descriptor {index} ({}): {} bits, {} samples, spacing {} ps, compression {}, gain {} offset {}",
                record.user_id,
                descriptor.bits_per_sample,
                descriptor.number_of_samples,
                descriptor.temporal_spacing,
                descriptor.compression_type,
                descriptor.digitizer_gain,
                descriptor.digitizer_offset
            );
            table.slots[usize::from(index)] = Some(descriptor);
        }
        Ok(table)
    }

    pub fn get(&self, index: u8) -> Option<&WaveformPacketDescriptor> {
        self.slots.get(usize::from(index)).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
