use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional protocol extensions a peer can advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Mainline DHT (BEP 5)
    Dht,
    /// Fast extension (BEP 6)
    FastPeers,
    /// Extension protocol (BEP 10)
    ExtensionProtocol,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Dht,
        Capability::FastPeers,
        Capability::ExtensionProtocol,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Dht => 0b001,
            Capability::FastPeers => 0b010,
            Capability::ExtensionProtocol => 0b100,
        }
    }

    /// Position of this flag in the handshake reserved bytes: (byte, mask)
    fn reserved_bit(self) -> (usize, u8) {
        match self {
            Capability::Dht => (7, 0x01),
            Capability::FastPeers => (7, 0x04),
            Capability::ExtensionProtocol => (5, 0x10),
        }
    }
}

/// Fixed set of capabilities, established once at construction
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct CapabilitySet {
    bits: u8,
}

impl CapabilitySet {
    pub fn new(capabilities: &[Capability]) -> Self {
        let bits = capabilities.iter().fold(0, |acc, c| acc | c.bit());
        Self { bits }
    }

    pub fn empty() -> Self {
        Self { bits: 0 }
    }

    /// The extensions this client advertises unless configured otherwise
    pub fn local_default() -> Self {
        Self::new(&[Capability::Dht, Capability::FastPeers])
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }

    /// Decode the 8 reserved bytes of a handshake
    pub fn from_reserved(reserved: &[u8; 8]) -> Self {
        let present: Vec<Capability> = Capability::ALL
            .into_iter()
            .filter(|c| {
                let (byte, mask) = c.reserved_bit();
                reserved[byte] & mask != 0
            })
            .collect();
        Self::new(&present)
    }

    /// Encode into the 8 reserved bytes of a handshake
    pub fn to_reserved(&self) -> [u8; 8] {
        let mut reserved = [0u8; 8];
        for capability in self.iter() {
            let (byte, mask) = capability.reserved_bit();
            reserved[byte] |= mask;
        }
        reserved
    }
}

/// A capability is usable between two parties only if both advertise it.
pub fn mutual_support(a: &CapabilitySet, b: &CapabilitySet, capability: Capability) -> bool {
    a.contains(capability) && b.contains(capability)
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(capabilities: Vec<Capability>) -> Self {
        Self::new(&capabilities)
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(set: CapabilitySet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
