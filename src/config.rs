use crate::peer::CapabilitySet;
use crate::wire::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};

/// Configuration for one swarm session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub listen_port: u16,
    /// Upper bound on peer records the registry will create
    pub max_peers: usize,
    /// Largest frame length prefix accepted from a peer
    pub max_frame_len: usize,
    /// Extensions advertised in our handshake
    pub capabilities: CapabilitySet,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_port: 6881,
            max_peers: 50,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            capabilities: CapabilitySet::local_default(),
        }
    }
}
