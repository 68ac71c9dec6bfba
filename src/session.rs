use crate::config::SessionConfig;
use crate::error::{PeerWireError, Result};
use crate::peer::{
    Capability, ChokeState, InterestState, PeerId, PeerInfo, PeerKey, PeerRecord, PeerRegistry,
};
use crate::piece::Bitfield;
use crate::policy::{BaselinePolicy, InterestPolicy};
use crate::torrent::Torrent;
use crate::wire::{FrameCodec, Handshake, Message, MessageId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Swarm-local state for one torrent: peers, local pieces and the choke policy.
///
/// All registry changes go through one lock, so an identity upgrade is never
/// observed half-done. Share it between connection tasks behind an `Arc`.
pub struct Session {
    torrent: Arc<Torrent>,
    config: SessionConfig,
    local_id: PeerId,
    registry: Mutex<PeerRegistry>,
    bitfield: RwLock<Bitfield>,
    policy: Box<dyn InterestPolicy>,
}

impl Session {
    pub fn new(torrent: Arc<Torrent>, config: SessionConfig, policy: Box<dyn InterestPolicy>) -> Self {
        let local_id = PeerId::generate();
        let piece_count = torrent.piece_count();

        info!(
            "Session for {} ({} pieces, info hash {}) with peer_id {}",
            torrent.name,
            piece_count,
            torrent.info_hash_hex(),
            local_id
        );

        Self {
            registry: Mutex::new(PeerRegistry::new(config.capabilities, piece_count)),
            bitfield: RwLock::new(Bitfield::new(piece_count)),
            torrent,
            config,
            local_id,
            policy,
        }
    }

    pub fn with_baseline_policy(torrent: Arc<Torrent>, config: SessionConfig) -> Self {
        Self::new(torrent, config, Box::new(BaselinePolicy))
    }

    pub fn torrent(&self) -> &Torrent {
        &self.torrent
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    pub fn local_handshake(&self) -> Handshake {
        Handshake::new(self.config.capabilities, self.torrent.info_hash, self.local_id)
    }

    pub fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.config.max_frame_len)
    }

    /// Register a contact handed over by a tracker or the DHT
    pub async fn register_from_peer_info(&self, info: &PeerInfo) -> Result<PeerKey> {
        let mut registry = self.registry.lock().await;
        self.ensure_capacity(&registry, Some(&info.peer_id()?), &info.socket_addr()?)?;
        registry.register_from_peer_info(info)
    }

    /// Register an inbound connection before its handshake arrives
    pub async fn register_inbound(&self, addr: SocketAddr) -> Result<PeerKey> {
        let mut registry = self.registry.lock().await;
        self.ensure_capacity(&registry, None, &addr)?;
        Ok(registry.register_unidentified(addr, Default::default()))
    }

    /// Bind the identity and extensions from a remote handshake to the peer at `addr`
    pub async fn on_handshake(&self, addr: SocketAddr, handshake: &Handshake) -> Result<PeerKey> {
        if handshake.info_hash != self.torrent.info_hash {
            return Err(PeerWireError::InvalidHandshake(
                "info hash mismatch".to_string(),
            ));
        }

        let mut registry = self.registry.lock().await;
        self.ensure_capacity(&registry, Some(&handshake.peer_id), &addr)?;

        let key = registry.resolve_or_create(handshake.peer_id, addr);
        registry.assign_address(key, addr)?;
        registry.set_capabilities(key, handshake.capabilities)?;
        // Verdicts given before this connection existed were never sent on it
        if let Some(peer) = registry.get_mut(key) {
            peer.reset_connection_state();
        }
        debug!(
            "{} at {} advertises {:?}",
            key, addr, handshake.capabilities
        );
        Ok(key)
    }

    fn ensure_capacity(
        &self,
        registry: &PeerRegistry,
        id: Option<&PeerId>,
        addr: &SocketAddr,
    ) -> Result<()> {
        let known = id.map_or(false, |id| registry.find_by_identity(id).is_some())
            || registry.find_by_address(addr).is_some();
        if !known && registry.len() >= self.config.max_peers {
            return Err(PeerWireError::Protocol(format!(
                "peer limit of {} reached",
                self.config.max_peers
            )));
        }
        Ok(())
    }

    pub async fn peer(&self, key: PeerKey) -> Option<PeerRecord> {
        self.registry.lock().await.get(key).cloned()
    }

    pub async fn find_by_identity(&self, id: &PeerId) -> Option<PeerKey> {
        self.registry.lock().await.find_by_identity(id)
    }

    pub async fn find_by_address(&self, addr: &SocketAddr) -> Option<PeerKey> {
        self.registry.lock().await.find_by_address(addr)
    }

    pub async fn identified_peers(&self) -> Vec<PeerRecord> {
        self.registry.lock().await.identified_peers()
    }

    pub async fn unidentified_peers(&self) -> Vec<PeerRecord> {
        self.registry.lock().await.unidentified_peers()
    }

    pub async fn supports(&self, key: PeerKey, capability: Capability) -> bool {
        self.registry.lock().await.supports(key, capability)
    }

    /// Forget a peer once its connection is gone
    pub async fn disconnect(&self, key: PeerKey) -> Option<PeerRecord> {
        let removed = self.registry.lock().await.remove(key);
        if removed.is_some() {
            debug!("Removed {}", key);
        }
        removed
    }

    /// Apply a decoded message's effect on the sending peer's record
    pub async fn handle_message(&self, key: PeerKey, message: &Message) -> Result<()> {
        let mut registry = self.registry.lock().await;
        let fast = registry.supports(key, Capability::FastPeers);
        let piece_count = self.torrent.piece_count();
        let peer = registry.get_mut(key).ok_or(PeerWireError::UnknownPeer)?;

        match message {
            Message::Choke => peer.peer_choking = true,
            Message::Unchoke => peer.peer_choking = false,
            Message::Interested => peer.peer_interested = true,
            Message::NotInterested => peer.peer_interested = false,
            Message::Have { piece_index } => {
                if !peer.pieces.set_piece(*piece_index as usize) {
                    return Err(PeerWireError::InvalidPiece {
                        index: *piece_index,
                        count: piece_count,
                    });
                }
            }
            Message::Bitfield { bitfield } => {
                peer.pieces = Bitfield::from_payload(bitfield, piece_count).ok_or_else(|| {
                    PeerWireError::MalformedMessage {
                        id: MessageId::Bitfield as u8,
                        reason: format!(
                            "{} bytes for {} pieces",
                            bitfield.len(),
                            piece_count
                        ),
                    }
                })?;
            }
            Message::HaveAll | Message::HaveNone => {
                if !fast {
                    return Err(PeerWireError::Protocol(format!(
                        "{:?} without fast extension",
                        message
                    )));
                }
                peer.pieces = if *message == Message::HaveAll {
                    Bitfield::full(piece_count)
                } else {
                    Bitfield::new(piece_count)
                };
            }
            _ => debug!("{} sent {:?}, nothing to record", key, message),
        }

        Ok(())
    }

    /// Record a downloaded piece after checking its hash; returns the Have to broadcast
    pub async fn complete_piece(&self, piece_index: u32, data: &[u8]) -> Result<Message> {
        let expected = self
            .torrent
            .piece_hash(piece_index as usize)
            .ok_or(PeerWireError::InvalidPiece {
                index: piece_index,
                count: self.torrent.piece_count(),
            })?;

        if !expected.verify(data) {
            warn!("Piece {} failed verification", piece_index);
            return Err(PeerWireError::PieceHashMismatch(piece_index));
        }

        self.bitfield.write().await.set_piece(piece_index as usize);
        info!("Piece {} verified and complete", piece_index);

        Ok(Message::Have { piece_index })
    }

    pub async fn has_piece(&self, piece_index: u32) -> bool {
        self.bitfield.read().await.has_piece(piece_index as usize)
    }

    pub async fn bitfield(&self) -> Bitfield {
        self.bitfield.read().await.clone()
    }

    /// The possession message to send right after the handshake
    pub async fn bitfield_message(&self, key: PeerKey) -> Message {
        let fast = self.supports(key, Capability::FastPeers).await;
        let bitfield = self.bitfield.read().await;

        if fast && bitfield.is_complete() {
            Message::HaveAll
        } else if fast && bitfield.is_empty() {
            Message::HaveNone
        } else {
            Message::Bitfield {
                bitfield: bitfield.to_bytes(),
            }
        }
    }

    /// Run the policy over every peer and apply the verdicts that changed.
    ///
    /// Returns the messages that announce those changes to the peers.
    pub async fn reevaluate(&self) -> Vec<(PeerKey, Message)> {
        let pieces_owned = self.bitfield.read().await.count();

        let mut registry = self.registry.lock().await;
        let outgoing = self.verdict_changes(&registry, pieces_owned);
        for (key, message) in &outgoing {
            record_verdict(&mut registry, *key, message);
        }

        if !outgoing.is_empty() {
            debug!("Policy changed {} verdicts", outgoing.len());
        }
        outgoing
    }

    /// Messages for every verdict that differs from what the peer was last told
    fn verdict_changes(
        &self,
        registry: &PeerRegistry,
        pieces_owned: usize,
    ) -> Vec<(PeerKey, Message)> {
        let mut stats = registry.stats();
        stats.pieces_owned = pieces_owned;

        let mut changes = Vec::new();
        for key in registry.keys() {
            let Some(peer) = registry.get(key) else {
                continue;
            };

            let interest = self.policy.evaluate_interest(peer, &stats);
            if interest != peer.interest {
                changes.push((
                    key,
                    match interest {
                        InterestState::Interested => Message::Interested,
                        InterestState::Uninterested => Message::NotInterested,
                    },
                ));
            }

            let choke = self.policy.evaluate_choke(peer, &stats);
            if choke != peer.choke {
                changes.push((
                    key,
                    match choke {
                        ChokeState::Choked => Message::Choke,
                        ChokeState::Unchoked => Message::Unchoke,
                    },
                ));
            }
        }
        changes
    }

    /// Re-run the policy every `period`, handing changes to `tx` until it is closed.
    ///
    /// A verdict is recorded only once its message is in the channel; whatever
    /// could not be sent is still pending on the next `reevaluate`.
    pub fn spawn_scheduler(
        self: Arc<Self>,
        period: Duration,
        tx: mpsc::Sender<(PeerKey, Message)>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;

                let pieces_owned = self.bitfield.read().await.count();
                let changes = {
                    let registry = self.registry.lock().await;
                    self.verdict_changes(&registry, pieces_owned)
                };

                for (key, message) in changes {
                    if tx.send((key, message.clone())).await.is_err() {
                        debug!("Policy scheduler stopped");
                        return;
                    }
                    record_verdict(&mut *self.registry.lock().await, key, &message);
                }
                if tx.is_closed() {
                    return;
                }
            }
        })
    }
}

/// Remember a verdict announced to `key` so it is not sent again
fn record_verdict(registry: &mut PeerRegistry, key: PeerKey, message: &Message) {
    let Some(peer) = registry.get_mut(key) else {
        return;
    };
    match message {
        Message::Interested => peer.interest = InterestState::Interested,
        Message::NotInterested => peer.interest = InterestState::Uninterested,
        Message::Choke => peer.choke = ChokeState::Choked,
        Message::Unchoke => peer.choke = ChokeState::Unchoked,
        _ => {}
    }
}
