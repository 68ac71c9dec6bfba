use bytes::Bytes;

/// Per-piece possession vector.
///
/// Bit 7 of byte 0 is piece 0; spare bits past `piece_count` stay zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    bits: Vec<u8>,
    piece_count: usize,
}

impl Bitfield {
    pub fn new(piece_count: usize) -> Self {
        Self {
            bits: vec![0; piece_count.div_ceil(8)],
            piece_count,
        }
    }

    pub fn full(piece_count: usize) -> Self {
        let mut bitfield = Self {
            bits: vec![0xff; piece_count.div_ceil(8)],
            piece_count,
        };
        bitfield.clear_spare_bits();
        bitfield
    }

    /// Build from a wire payload, which must be exactly as long as the piece count requires
    pub fn from_payload(payload: &[u8], piece_count: usize) -> Option<Self> {
        if payload.len() != piece_count.div_ceil(8) {
            return None;
        }
        let mut bitfield = Self {
            bits: payload.to_vec(),
            piece_count,
        };
        bitfield.clear_spare_bits();
        Some(bitfield)
    }

    pub fn has_piece(&self, index: usize) -> bool {
        if index >= self.piece_count {
            return false;
        }
        let byte_index = index / 8;
        let bit_index = 7 - (index % 8);
        (self.bits[byte_index] >> bit_index) & 1 == 1
    }

    /// Returns false if the index is out of range
    pub fn set_piece(&mut self, index: usize) -> bool {
        if index >= self.piece_count {
            return false;
        }
        let byte_index = index / 8;
        let bit_index = 7 - (index % 8);
        self.bits[byte_index] |= 1 << bit_index;
        true
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    pub fn is_complete(&self) -> bool {
        self.count() == self.piece_count
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bits)
    }

    fn clear_spare_bits(&mut self) {
        let spare = self.bits.len() * 8 - self.piece_count;
        if spare > 0 {
            if let Some(last) = self.bits.last_mut() {
                *last &= 0xffu8 << spare;
            }
        }
    }
}
