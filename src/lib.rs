//! Peer-wire core of a BitTorrent client: who is in the swarm, what they
//! support, whether we serve them, and the bytes we exchange with them.

pub mod config;
pub mod error;
pub mod peer;
pub mod piece;
pub mod policy;
pub mod session;
pub mod torrent;
pub mod wire;

pub use config::SessionConfig;
pub use error::{PeerWireError, Result};
pub use session::Session;
