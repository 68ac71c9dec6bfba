use super::{mutual_support, Capability, CapabilitySet, ChokeState, PeerId, PeerInfo, PeerRecord};
use crate::error::{PeerWireError, Result};
use crate::policy::SwarmStats;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Stable handle to a record inside a [`PeerRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerKey(u64);

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Authority for peer existence and identity within one swarm.
///
/// Records are indexed both by [`PeerId`] (identified peers) and by socket
/// address (any peer whose address is known). A record without identity is
/// always reachable through its address.
pub struct PeerRegistry {
    local: CapabilitySet,
    piece_count: usize,
    records: HashMap<PeerKey, PeerRecord>,
    by_id: HashMap<PeerId, PeerKey>,
    by_addr: HashMap<SocketAddr, PeerKey>,
    next_key: u64,
}

impl PeerRegistry {
    pub fn new(local: CapabilitySet, piece_count: usize) -> Self {
        Self {
            local,
            piece_count,
            records: HashMap::new(),
            by_id: HashMap::new(),
            by_addr: HashMap::new(),
            next_key: 0,
        }
    }

    pub fn local_capabilities(&self) -> &CapabilitySet {
        &self.local
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: PeerKey) -> Option<&PeerRecord> {
        self.records.get(&key)
    }

    pub fn get_mut(&mut self, key: PeerKey) -> Option<&mut PeerRecord> {
        self.records.get_mut(&key)
    }

    pub fn find_by_identity(&self, id: &PeerId) -> Option<PeerKey> {
        self.by_id.get(id).copied()
    }

    pub fn find_by_address(&self, addr: &SocketAddr) -> Option<PeerKey> {
        self.by_addr.get(addr).copied()
    }

    /// Look a peer up by identity, then by address, creating it if neither matches.
    ///
    /// A record found by address is replaced by an identified record that keeps
    /// only its capabilities; the address is left unset in that case and for
    /// brand-new records.
    pub fn resolve_or_create(&mut self, id: PeerId, addr: SocketAddr) -> PeerKey {
        if let Some(key) = self.find_by_identity(&id) {
            return key;
        }

        if let Some(old_key) = self.find_by_address(&addr) {
            if let Some(old) = self.remove(old_key) {
                if let Some(previous) = old.identity() {
                    warn!(
                        "Address {} changed identity from {} to {}",
                        addr, previous, id
                    );
                }
                let key = self.insert(old.with_identity(id));
                debug!("Upgraded {} at {} to {} with id {}", old_key, addr, key, id);
                return key;
            }
        }

        let key = self.insert(PeerRecord::identified(
            id,
            CapabilitySet::empty(),
            self.piece_count,
        ));
        debug!("New peer {} with id {}", key, id);
        key
    }

    /// Register a tracker/DHT contact, always leaving the record at `info`'s address
    pub fn register_from_peer_info(&mut self, info: &PeerInfo) -> Result<PeerKey> {
        let id = info.peer_id()?;
        let addr = info.socket_addr()?;

        let key = self.resolve_or_create(id, addr);
        self.assign_address(key, addr)?;
        Ok(key)
    }

    /// Register a peer whose identity is not known yet (e.g. an inbound connection)
    pub fn register_unidentified(
        &mut self,
        addr: SocketAddr,
        capabilities: CapabilitySet,
    ) -> PeerKey {
        if let Some(key) = self.find_by_address(&addr) {
            return key;
        }

        let key = self.insert(PeerRecord::unidentified(
            addr,
            capabilities,
            self.piece_count,
        ));
        debug!("New unidentified peer {} at {}", key, addr);
        key
    }

    /// Point `key` at `addr`, taking the address away from any other record
    pub fn assign_address(&mut self, key: PeerKey, addr: SocketAddr) -> Result<()> {
        let current = self
            .records
            .get(&key)
            .ok_or(PeerWireError::UnknownPeer)?
            .address();
        if current == Some(addr) {
            return Ok(());
        }

        if let Some(other_key) = self.find_by_address(&addr) {
            let other_identified = self
                .records
                .get(&other_key)
                .map_or(false, PeerRecord::is_identified);

            if other_identified {
                warn!("Address {} moved from {} to {}", addr, other_key, key);
                self.by_addr.remove(&addr);
                if let Some(other) = self.records.get_mut(&other_key) {
                    other.set_address(None);
                }
            } else {
                debug!("Merging unidentified {} into {}", other_key, key);
                self.remove(other_key);
            }
        }

        if let Some(old) = current {
            self.by_addr.remove(&old);
        }
        self.by_addr.insert(addr, key);
        if let Some(record) = self.records.get_mut(&key) {
            record.set_address(Some(addr));
        }
        Ok(())
    }

    /// Replace the capability set advertised by a peer
    pub fn set_capabilities(&mut self, key: PeerKey, capabilities: CapabilitySet) -> Result<()> {
        let record = self.records.get_mut(&key).ok_or(PeerWireError::UnknownPeer)?;
        record.set_capabilities(capabilities);
        Ok(())
    }

    /// True iff both this session and the peer advertise `capability`
    pub fn supports(&self, key: PeerKey, capability: Capability) -> bool {
        self.records
            .get(&key)
            .map_or(false, |peer| {
                mutual_support(&self.local, peer.capabilities(), capability)
            })
    }

    pub fn remove(&mut self, key: PeerKey) -> Option<PeerRecord> {
        let record = self.records.remove(&key)?;
        if let Some(id) = record.identity() {
            self.by_id.remove(&id);
        }
        if let Some(addr) = record.address() {
            self.by_addr.remove(&addr);
        }
        Some(record)
    }

    pub fn identified_peers(&self) -> Vec<PeerRecord> {
        self.records
            .values()
            .filter(|r| r.is_identified())
            .cloned()
            .collect()
    }

    pub fn unidentified_peers(&self) -> Vec<PeerRecord> {
        self.records
            .values()
            .filter(|r| !r.is_identified())
            .cloned()
            .collect()
    }

    pub fn keys(&self) -> Vec<PeerKey> {
        let mut keys: Vec<PeerKey> = self.records.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> SwarmStats {
        let mut stats = SwarmStats {
            total_pieces: self.piece_count,
            ..SwarmStats::default()
        };
        for record in self.records.values() {
            if record.is_identified() {
                stats.identified += 1;
            } else {
                stats.unidentified += 1;
            }
            if record.peer_interested {
                stats.interested_in_us += 1;
            }
            if record.choke == ChokeState::Unchoked {
                stats.unchoked += 1;
            }
        }
        stats
    }

    fn insert(&mut self, record: PeerRecord) -> PeerKey {
        let key = PeerKey(self.next_key);
        self.next_key += 1;

        if let Some(id) = record.identity() {
            self.by_id.insert(id, key);
        }
        if let Some(addr) = record.address() {
            self.by_addr.insert(addr, key);
        }
        self.records.insert(key, record);
        key
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (id, key) in &self.by_id {
            assert_eq!(self.records[key].identity(), Some(*id));
        }
        for (addr, key) in &self.by_addr {
            assert_eq!(self.records[key].address(), Some(*addr));
        }
        for (key, record) in &self.records {
            match record.identity() {
                Some(id) => assert_eq!(self.by_id.get(&id), Some(key)),
                None => assert!(record.address().is_some()),
            }
            if let Some(addr) = record.address() {
                assert_eq!(self.by_addr.get(&addr), Some(key));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    fn id(byte: u8) -> PeerId {
        PeerId::new([byte; 20])
    }

    fn registry() -> PeerRegistry {
        PeerRegistry::new(CapabilitySet::local_default(), 16)
    }

    #[test]
    fn test_resolve_or_create_is_idempotent() {
        let mut registry = registry();
        let first = registry.resolve_or_create(id(1), addr(1000));
        let second = registry.resolve_or_create(id(1), addr(1000));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(first).unwrap().address(), None);
    }

    #[test]
    fn test_upgrade_unidentified_peer() {
        let mut registry = registry();
        let caps = CapabilitySet::new(&[Capability::Dht]);
        let old = registry.register_unidentified(addr(1000), caps);
        assert_eq!(registry.unidentified_peers().len(), 1);

        let key = registry.resolve_or_create(id(7), addr(1000));

        assert_ne!(key, old);
        assert!(registry.get(old).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.unidentified_peers().is_empty());

        let identified = registry.identified_peers();
        assert_eq!(identified.len(), 1);
        assert_eq!(identified[0].identity(), Some(id(7)));
        assert_eq!(identified[0].capabilities(), &caps);
        // The upgrade does not carry the address
        assert_eq!(identified[0].address(), None);
        assert_eq!(registry.find_by_address(&addr(1000)), None);
        registry.assert_consistent();
    }

    #[test]
    fn test_identified_peer_is_replaced_on_new_identity() {
        let mut registry = registry();
        let info = PeerInfo::new([1u8; 20], "10.0.0.1", 1000);
        let first = registry.register_from_peer_info(&info).unwrap();

        let second = registry.resolve_or_create(id(2), addr(1000));

        assert_ne!(first, second);
        assert_eq!(registry.find_by_identity(&id(1)), None);
        assert_eq!(registry.find_by_identity(&id(2)), Some(second));
        assert_eq!(registry.len(), 1);
        registry.assert_consistent();
    }

    #[test]
    fn test_register_from_peer_info_sets_address() {
        let mut registry = registry();

        // Brand-new peer
        let info = PeerInfo::new([1u8; 20], "10.0.0.1", 1000);
        let key = registry.register_from_peer_info(&info).unwrap();
        assert_eq!(registry.get(key).unwrap().address(), Some(addr(1000)));

        // Known identity, new address
        let moved = PeerInfo::new([1u8; 20], "10.0.0.1", 2000);
        let same = registry.register_from_peer_info(&moved).unwrap();
        assert_eq!(same, key);
        assert_eq!(registry.get(key).unwrap().address(), Some(addr(2000)));
        assert_eq!(registry.find_by_address(&addr(1000)), None);

        // Unidentified peer upgraded by address
        registry.register_unidentified(addr(3000), CapabilitySet::empty());
        let upgraded = PeerInfo::new([3u8; 20], "10.0.0.1", 3000);
        let key = registry.register_from_peer_info(&upgraded).unwrap();
        assert_eq!(registry.get(key).unwrap().address(), Some(addr(3000)));
        assert_eq!(registry.find_by_address(&addr(3000)), Some(key));
        registry.assert_consistent();
    }

    #[test]
    fn test_register_from_peer_info_rejects_bad_input() {
        let mut registry = registry();
        let bad = PeerInfo::new(vec![1u8; 4], "10.0.0.1", 1000);
        assert!(registry.register_from_peer_info(&bad).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_address_taken_from_identified_peer() {
        let mut registry = registry();
        let a = registry
            .register_from_peer_info(&PeerInfo::new([1u8; 20], "10.0.0.1", 1000))
            .unwrap();
        let b = registry.resolve_or_create(id(2), addr(5000));
        assert_eq!(registry.find_by_address(&addr(5000)), None);

        registry.assign_address(b, addr(1000)).unwrap();

        assert_eq!(registry.find_by_address(&addr(1000)), Some(b));
        assert_eq!(registry.get(a).unwrap().address(), None);
        assert_eq!(registry.find_by_identity(&id(1)), Some(a));
        registry.assert_consistent();
    }

    #[test]
    fn test_assign_address_merges_unidentified() {
        let mut registry = registry();
        let stray = registry.register_unidentified(addr(1000), CapabilitySet::empty());
        let key = registry.resolve_or_create(id(1), addr(9999));

        registry.assign_address(key, addr(1000)).unwrap();

        assert!(registry.get(stray).is_none());
        assert_eq!(registry.len(), 1);
        registry.assert_consistent();
    }

    #[test]
    fn test_lookup_misses() {
        let registry = registry();
        assert_eq!(registry.find_by_identity(&id(1)), None);
        assert_eq!(registry.find_by_address(&addr(1)), None);
    }

    #[test]
    fn test_supports() {
        let mut registry = registry();
        let key = registry.register_unidentified(
            addr(1000),
            CapabilitySet::new(&[Capability::Dht, Capability::ExtensionProtocol]),
        );

        assert!(registry.supports(key, Capability::Dht));
        assert!(!registry.supports(key, Capability::FastPeers));
        assert!(!registry.supports(key, Capability::ExtensionProtocol));

        registry.remove(key);
        assert!(!registry.supports(key, Capability::Dht));
    }

    #[test]
    fn test_snapshots_are_detached() {
        let mut registry = registry();
        let key = registry.resolve_or_create(id(1), addr(1000));

        let mut snapshot = registry.identified_peers();
        snapshot[0].choke = ChokeState::Unchoked;
        snapshot.clear();

        assert_eq!(registry.get(key).unwrap().choke, ChokeState::Choked);
        assert_eq!(registry.identified_peers().len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut registry = registry();
        let key = registry
            .register_from_peer_info(&PeerInfo::new([1u8; 20], "10.0.0.1", 1000))
            .unwrap();

        let removed = registry.remove(key).unwrap();
        assert_eq!(removed.identity(), Some(id(1)));
        assert!(registry.is_empty());
        assert_eq!(registry.find_by_identity(&id(1)), None);
        assert_eq!(registry.find_by_address(&addr(1000)), None);
        assert!(registry.remove(key).is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Resolve(u8, u16),
        FromInfo(u8, u16),
        Unidentified(u16),
        Remove(u16),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, 0u16..4).prop_map(|(i, p)| Op::Resolve(i, p)),
            (0u8..4, 0u16..4).prop_map(|(i, p)| Op::FromInfo(i, p)),
            (0u16..4).prop_map(Op::Unidentified),
            (0u16..4).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_keys_stay_unique(ops in prop::collection::vec(op(), 0..40)) {
            let mut registry = registry();
            for op in ops {
                match op {
                    Op::Resolve(i, p) => {
                        registry.resolve_or_create(id(i), addr(p));
                    }
                    Op::FromInfo(i, p) => {
                        let info = PeerInfo::new([i; 20], "10.0.0.1", p);
                        let key = registry.register_from_peer_info(&info).unwrap();
                        prop_assert_eq!(registry.get(key).unwrap().address(), Some(addr(p)));
                    }
                    Op::Unidentified(p) => {
                        registry.register_unidentified(addr(p), CapabilitySet::empty());
                    }
                    Op::Remove(p) => {
                        if let Some(key) = registry.find_by_address(&addr(p)) {
                            registry.remove(key);
                        }
                    }
                }
                registry.assert_consistent();
                prop_assert_eq!(
                    registry.identified_peers().len() + registry.unidentified_peers().len(),
                    registry.len()
                );
            }
        }
    }
}
