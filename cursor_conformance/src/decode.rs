//! Little-endian `u32` column decoding, in the two ways a driver can widen
//! a 4-byte cell into a 64-bit accumulator.

const WORD: usize = 4;

/// Packed little-endian words together with the sum of the input values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedWords {
    pub bytes: Vec<u8>,
    pub checksum: u64,
}

impl EncodedWords {
    pub fn len(&self) -> usize {
        self.bytes.len() / WORD
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn encode_u32_le(values: &[u32]) -> EncodedWords {
    let mut bytes = Vec::with_capacity(values.len() * WORD);
    let mut checksum = 0u64;
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
        checksum = checksum.wrapping_add(u64::from(*value));
    }
    EncodedWords { bytes, checksum }
}

/// Loads each word as a `u32` and widens it.
pub fn sum_u32_le_direct(buf: &[u8]) -> u64 {
    buf.chunks_exact(WORD)
        .map(|w| u64::from(u32::from_le_bytes([w[0], w[1], w[2], w[3]])))
        .fold(0u64, u64::wrapping_add)
}

/// Copies each word into the low half of a zeroed 8-byte buffer and reads
/// that as an `i64`.
pub fn sum_u32_le_widened(buf: &[u8]) -> u64 {
    let mut sum = 0u64;
    for word in buf.chunks_exact(WORD) {
        let mut wide = [0u8; 8];
        wide[..WORD].copy_from_slice(word);
        // High half is zero, so the value is never negative.
        sum = sum.wrapping_add(i64::from_le_bytes(wide) as u64);
    }
    sum
}
