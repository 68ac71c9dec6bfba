mod connection;
mod handshake;
mod message;

pub use connection::PeerConnection;
pub use handshake::{Handshake, HANDSHAKE_LEN, PROTOCOL_STRING};
pub use message::{
    BlockInfo, FrameCodec, Message, MessageId, DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_LEN,
};
