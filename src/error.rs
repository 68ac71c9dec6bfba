use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeerWireError {
    #[error("Incomplete message: need {needed} bytes, have {available}")]
    IncompleteMessage { needed: usize, available: usize },

    #[error("Unknown message ID: {0}")]
    UnknownMessage(u8),

    #[error("Malformed message {id}: {reason}")]
    MalformedMessage { id: u8, reason: String },

    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    #[error("Invalid peer id: expected 20 bytes, got {0}")]
    InvalidPeerId(usize),

    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    #[error("Invalid piece index {index} (torrent has {count} pieces)")]
    InvalidPiece { index: u32, count: usize },

    #[error("Piece {0} failed hash verification")]
    PieceHashMismatch(u32),

    #[error("Unknown peer")]
    UnknownPeer,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerWireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        fn read() -> Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))?;
            Ok(())
        }

        match read() {
            Err(PeerWireError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {:?}", other),
        }
    }
}
