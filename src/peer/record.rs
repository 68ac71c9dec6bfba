use super::{CapabilitySet, ChokeState, InterestState, PeerId};
use crate::piece::Bitfield;
use std::net::SocketAddr;

/// Everything the session knows about one remote participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    identity: Option<PeerId>,
    address: Option<SocketAddr>,
    capabilities: CapabilitySet,
    /// Whether we are choking the peer
    pub choke: ChokeState,
    /// Whether we are interested in the peer
    pub interest: InterestState,
    /// Whether the peer is choking us
    pub peer_choking: bool,
    /// Whether the peer is interested in us
    pub peer_interested: bool,
    /// Pieces the peer has advertised
    pub pieces: Bitfield,
}

impl PeerRecord {
    pub(crate) fn identified(id: PeerId, capabilities: CapabilitySet, piece_count: usize) -> Self {
        Self::build(Some(id), None, capabilities, piece_count)
    }

    pub(crate) fn unidentified(
        address: SocketAddr,
        capabilities: CapabilitySet,
        piece_count: usize,
    ) -> Self {
        Self::build(None, Some(address), capabilities, piece_count)
    }

    fn build(
        identity: Option<PeerId>,
        address: Option<SocketAddr>,
        capabilities: CapabilitySet,
        piece_count: usize,
    ) -> Self {
        Self {
            identity,
            address,
            capabilities,
            choke: ChokeState::Choked,
            interest: InterestState::Uninterested,
            peer_choking: true,
            peer_interested: false,
            pieces: Bitfield::new(piece_count),
        }
    }

    /// A fresh identified record that keeps only this record's capabilities.
    ///
    /// The address is not carried over; callers re-assert it.
    pub(crate) fn with_identity(&self, id: PeerId) -> Self {
        Self::identified(id, self.capabilities, self.pieces.piece_count())
    }

    pub fn identity(&self) -> Option<PeerId> {
        self.identity
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn is_identified(&self) -> bool {
        self.identity.is_some()
    }

    pub(crate) fn set_address(&mut self, address: Option<SocketAddr>) {
        self.address = address;
    }

    pub(crate) fn set_capabilities(&mut self, capabilities: CapabilitySet) {
        self.capabilities = capabilities;
    }

    /// Back to the choked, uninterested state every new connection starts in
    pub(crate) fn reset_connection_state(&mut self) {
        self.choke = ChokeState::Choked;
        self.interest = InterestState::Uninterested;
        self.peer_choking = true;
        self.peer_interested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::Capability;

    #[test]
    fn test_defaults() {
        let addr: SocketAddr = "10.0.0.1:6881".parse().unwrap();
        let record = PeerRecord::unidentified(addr, CapabilitySet::empty(), 8);

        assert!(!record.is_identified());
        assert_eq!(record.address(), Some(addr));
        assert_eq!(record.choke, ChokeState::Choked);
        assert_eq!(record.interest, InterestState::Uninterested);
        assert!(record.peer_choking);
        assert!(!record.peer_interested);
        assert_eq!(record.pieces.piece_count(), 8);
    }

    #[test]
    fn test_with_identity_drops_address() {
        let addr: SocketAddr = "10.0.0.1:6881".parse().unwrap();
        let caps = CapabilitySet::new(&[Capability::FastPeers]);
        let mut record = PeerRecord::unidentified(addr, caps, 8);
        record.choke = ChokeState::Unchoked;

        let id = PeerId::new([3u8; 20]);
        let upgraded = record.with_identity(id);

        assert_eq!(upgraded.identity(), Some(id));
        assert_eq!(upgraded.address(), None);
        assert_eq!(upgraded.capabilities(), &caps);
        assert_eq!(upgraded.choke, ChokeState::Choked);
    }

    #[test]
    fn test_reset_connection_state() {
        let addr: SocketAddr = "10.0.0.1:6881".parse().unwrap();
        let mut record = PeerRecord::unidentified(addr, CapabilitySet::empty(), 8);
        record.choke = ChokeState::Unchoked;
        record.interest = InterestState::Interested;
        record.peer_choking = false;
        record.peer_interested = true;
        record.pieces.set_piece(1);

        record.reset_connection_state();

        assert_eq!(record.choke, ChokeState::Choked);
        assert_eq!(record.interest, InterestState::Uninterested);
        assert!(record.peer_choking);
        assert!(!record.peer_interested);
        assert!(record.pieces.has_piece(1));
    }
}
