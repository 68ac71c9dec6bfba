mod piece;

pub use piece::PieceHash;

/// Swarm identity and piece hashes, as produced by the metainfo parser.
///
/// The peer-wire core only reads this; it is never mutated after the session starts.
#[derive(Debug, Clone)]
pub struct Torrent {
    /// SHA1 hash of the bencoded info dictionary
    pub info_hash: [u8; 20],
    /// Suggested name for the file or directory
    pub name: String,
    /// Expected hash of every piece, in index order
    pub pieces: Vec<PieceHash>,
}

impl Torrent {
    pub fn new(info_hash: [u8; 20], name: impl Into<String>, pieces: Vec<PieceHash>) -> Self {
        Self {
            info_hash,
            name: name.into(),
            pieces,
        }
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece_hash(&self, index: usize) -> Option<&PieceHash> {
        self.pieces.get(index)
    }

    /// Get the info hash as a hex string
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }
}
