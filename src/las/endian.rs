use once_cell::sync::Lazy;

/// Byte order of multi-byte values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

static HOST_ORDER: Lazy<ByteOrder> = Lazy::new(|| {
    if u16::from_ne_bytes([1, 0]) == 1 {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    }
});

impl ByteOrder {
    /// LAS stores everything little-endian.
    pub const LAS: ByteOrder = ByteOrder::Little;

    /// Detected on first use and fixed for the life of the process.
    pub fn host() -> ByteOrder {
        *HOST_ORDER
    }
}

/// Decode one unsigned sample of 1..=4 bytes stored in `file` order.
pub fn decode_sample(bytes: &[u8], file: ByteOrder) -> u32 {
    let swap = file != ByteOrder::host();
    match *bytes {
        [] => 0,
        [b] => u32::from(b),
        [a, b] => {
            let v = u16::from_ne_bytes([a, b]);
            u32::from(if swap { v.swap_bytes() } else { v })
        }
        [a, b, c, d] => {
            let v = u32::from_ne_bytes([a, b, c, d]);
            if swap {
                v.swap_bytes()
            } else {
                v
            }
        }
        // odd widths (24 bit) have no native integer, assemble by significance
        _ => {
            let ordered: Vec<u8> = match file {
                ByteOrder::Little => bytes.iter().rev().copied().collect(),
                ByteOrder::Big => bytes.to_vec(),
            };
            ordered
                .iter()
                .take(4)
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
        }
    }
}

// Fixed-offset little-endian field readers. Callers check the buffer length first.
pub(crate) fn u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn i16_at(buf: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn u32_at(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn u64_at(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}

pub(crate) fn f32_at(buf: &[u8], off: usize) -> f32 {
    f32::from_bits(u32_at(buf, off))
}

pub(crate) fn f64_at(buf: &[u8], off: usize) -> f64 {
    f64::from_bits(u64_at(buf, off))
}
