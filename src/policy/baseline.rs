use super::{InterestPolicy, SwarmStats};
use crate::peer::{ChokeState, InterestState, PeerRecord};

/// Interested in and unchoking every peer, whatever its state
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselinePolicy;

impl InterestPolicy for BaselinePolicy {
    fn evaluate_interest(&self, _peer: &PeerRecord, _stats: &SwarmStats) -> InterestState {
        InterestState::Interested
    }

    fn evaluate_choke(&self, _peer: &PeerRecord, _stats: &SwarmStats) -> ChokeState {
        ChokeState::Unchoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{CapabilitySet, PeerId};
    use proptest::prelude::*;
    use std::net::SocketAddr;

    proptest! {
        #[test]
        fn prop_baseline_always_serves(
            identified in any::<bool>(),
            choked in any::<bool>(),
            interested in any::<bool>(),
            peer_choking in any::<bool>(),
            peer_interested in any::<bool>(),
            port in any::<u16>(),
            id in any::<[u8; 20]>(),
        ) {
            let addr = SocketAddr::from(([192, 168, 1, 2], port));
            let mut peer = if identified {
                PeerRecord::identified(PeerId::new(id), CapabilitySet::empty(), 4)
            } else {
                PeerRecord::unidentified(addr, CapabilitySet::local_default(), 4)
            };
            peer.choke = if choked { ChokeState::Choked } else { ChokeState::Unchoked };
            peer.interest = if interested {
                InterestState::Interested
            } else {
                InterestState::Uninterested
            };
            peer.peer_choking = peer_choking;
            peer.peer_interested = peer_interested;

            let stats = SwarmStats::default();
            prop_assert_eq!(BaselinePolicy.evaluate_interest(&peer, &stats), InterestState::Interested);
            prop_assert_eq!(BaselinePolicy.evaluate_choke(&peer, &stats), ChokeState::Unchoked);
        }
    }
}
