use super::PeerId;
use crate::error::{PeerWireError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Contact record for a peer, as handed over by a tracker or the DHT
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: Vec<u8>,
    pub ip: String,
    pub port: u16,
}

impl PeerInfo {
    pub fn new(peer_id: impl Into<Vec<u8>>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            peer_id: peer_id.into(),
            ip: ip.into(),
            port,
        }
    }

    pub fn peer_id(&self) -> Result<PeerId> {
        PeerId::from_slice(&self.peer_id)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|_| PeerWireError::InvalidAddress(self.ip.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let info = PeerInfo::new([1u8; 20], "10.0.0.7", 51413);
        assert_eq!(info.socket_addr().unwrap(), "10.0.0.7:51413".parse().unwrap());

        let v6 = PeerInfo::new([1u8; 20], "::1", 6881);
        assert_eq!(v6.socket_addr().unwrap(), "[::1]:6881".parse().unwrap());
    }

    #[test]
    fn test_invalid_fields() {
        let bad_ip = PeerInfo::new([1u8; 20], "tracker.example", 6881);
        assert!(matches!(
            bad_ip.socket_addr(),
            Err(PeerWireError::InvalidAddress(_))
        ));

        let bad_id = PeerInfo::new(vec![1u8; 8], "10.0.0.1", 6881);
        assert!(matches!(bad_id.peer_id(), Err(PeerWireError::InvalidPeerId(8))));
    }
}
