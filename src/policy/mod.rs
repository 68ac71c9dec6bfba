//! Choke and interest decisions.
//!
//! A policy only looks at a peer and returns a verdict. Applying the verdict
//! (and telling the peer about it) is up to the session.

mod baseline;

pub use baseline::BaselinePolicy;

use crate::peer::{ChokeState, InterestState, PeerRecord};

/// Swarm-wide aggregates a policy may consult
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwarmStats {
    pub identified: usize,
    pub unidentified: usize,
    /// Peers that told us they are interested
    pub interested_in_us: usize,
    /// Peers we currently unchoke
    pub unchoked: usize,
    /// Pieces the local session already has
    pub pieces_owned: usize,
    pub total_pieces: usize,
}

impl SwarmStats {
    pub fn peers(&self) -> usize {
        self.identified + self.unidentified
    }
}

/// Strategy deciding whether we want data from a peer and whether we serve it
pub trait InterestPolicy: Send + Sync {
    fn evaluate_interest(&self, peer: &PeerRecord, stats: &SwarmStats) -> InterestState;

    fn evaluate_choke(&self, peer: &PeerRecord, stats: &SwarmStats) -> ChokeState;
}
