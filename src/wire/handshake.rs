use crate::error::{PeerWireError, Result};
use crate::peer::{CapabilitySet, PeerId};

pub const PROTOCOL_STRING: &[u8] = b"BitTorrent protocol";

/// Total size: 1 + 19 + 8 + 20 + 20
pub const HANDSHAKE_LEN: usize = 68;

/// Handshake message for peer wire protocol
/// Format: <pstrlen><pstr><reserved><info_hash><peer_id>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub capabilities: CapabilitySet,
    pub info_hash: [u8; 20],
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn new(capabilities: CapabilitySet, info_hash: [u8; 20], peer_id: PeerId) -> Self {
        Self {
            capabilities,
            info_hash,
            peer_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HANDSHAKE_LEN);
        buf.push(PROTOCOL_STRING.len() as u8);
        buf.extend_from_slice(PROTOCOL_STRING);
        // Reserved bytes carry the extension flags
        buf.extend_from_slice(&self.capabilities.to_reserved());
        buf.extend_from_slice(&self.info_hash);
        buf.extend_from_slice(self.peer_id.as_bytes());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerWireError::InvalidHandshake(format!(
                "expected {} bytes, got {}",
                HANDSHAKE_LEN,
                data.len()
            )));
        }

        let pstrlen = data[0] as usize;
        if pstrlen != PROTOCOL_STRING.len() || &data[1..1 + pstrlen] != PROTOCOL_STRING {
            return Err(PeerWireError::InvalidHandshake(
                "unsupported protocol string".to_string(),
            ));
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        Ok(Handshake {
            capabilities: CapabilitySet::from_reserved(&reserved),
            info_hash,
            peer_id: PeerId::from_slice(&data[48..68])?,
        })
    }
}
