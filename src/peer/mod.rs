mod capability;
mod info;
mod peer_id;
mod record;
mod registry;

pub use capability::{mutual_support, Capability, CapabilitySet};
pub use info::PeerInfo;
pub use peer_id::PeerId;
pub use record::PeerRecord;
pub use registry::{PeerKey, PeerRegistry};

/// Whether we refuse or allow uploads to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChokeState {
    Choked,
    Unchoked,
}

/// Whether we want to download from a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterestState {
    Interested,
    Uninterested,
}
