use crate::error::{PeerWireError, Result};
use rand::Rng;
use std::fmt;

const PEER_ID_PREFIX: &[u8; 8] = b"-PW0001-";

/// 20-byte identifier a peer announces in its handshake
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; 20]);

impl PeerId {
    pub fn new(id: [u8; 20]) -> Self {
        Self(id)
    }

    /// Generate a random peer ID
    /// Format: -PW0001-<12 random chars>
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        id[0..8].copy_from_slice(PEER_ID_PREFIX);

        let mut rng = rand::thread_rng();
        for byte in &mut id[8..] {
            *byte = rng.gen_range(b'0'..=b'z');
        }

        Self(id)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let id: [u8; 20] = slice
            .try_into()
            .map_err(|_| PeerWireError::InvalidPeerId(slice.len()))?;
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(self.0))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
