use crate::error::{PeerWireError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Length prefix size of every frame
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest `length` a frame may declare before it is rejected as malformed:
/// a 256 KiB block plus 13 bytes for the id and Piece header
pub const DEFAULT_MAX_FRAME_LEN: usize = 256 * 1024 + 13;

/// Information about a block within a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Piece index
    pub piece_index: u32,
    /// Byte offset within the piece
    pub offset: u32,
    /// Length of the block
    pub length: u32,
}

impl BlockInfo {
    pub fn new(piece_index: u32, offset: u32, length: u32) -> Self {
        Self {
            piece_index,
            offset,
            length,
        }
    }
}

/// Message type IDs
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Choke = 0x00,
    Unchoke = 0x01,
    Interested = 0x02,
    NotInterested = 0x03,
    Have = 0x04,
    Bitfield = 0x05,
    Request = 0x06,
    Piece = 0x07,
    Cancel = 0x08,
    Port = 0x09,
    Suggest = 0x0d,
    HaveAll = 0x0e,
    HaveNone = 0x0f,
    RejectRequest = 0x10,
    AllowedFast = 0x11,
}

impl TryFrom<u8> for MessageId {
    type Error = PeerWireError;

    fn try_from(id: u8) -> Result<Self> {
        use MessageId::*;
        Ok(match id {
            0x00 => Choke,
            0x01 => Unchoke,
            0x02 => Interested,
            0x03 => NotInterested,
            0x04 => Have,
            0x05 => Bitfield,
            0x06 => Request,
            0x07 => Piece,
            0x08 => Cancel,
            0x09 => Port,
            0x0d => Suggest,
            0x0e => HaveAll,
            0x0f => HaveNone,
            0x10 => RejectRequest,
            0x11 => AllowedFast,
            _ => return Err(PeerWireError::UnknownMessage(id)),
        })
    }
}

/// Messages exchanged between peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Keep-alive message (zero-length frame)
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    /// Sender now has the piece
    Have { piece_index: u32 },
    /// Sender's full piece possession, sent right after the handshake
    Bitfield { bitfield: Bytes },
    Request { block: BlockInfo },
    Piece {
        piece_index: u32,
        offset: u32,
        data: Bytes,
    },
    Cancel { block: BlockInfo },
    /// DHT listen port
    Port { port: u16 },
    Suggest { piece_index: u32 },
    HaveAll,
    HaveNone,
    RejectRequest { block: BlockInfo },
    AllowedFast { piece_index: u32 },
}

impl Message {
    pub fn id(&self) -> Option<MessageId> {
        Some(match self {
            Message::KeepAlive => return None,
            Message::Choke => MessageId::Choke,
            Message::Unchoke => MessageId::Unchoke,
            Message::Interested => MessageId::Interested,
            Message::NotInterested => MessageId::NotInterested,
            Message::Have { .. } => MessageId::Have,
            Message::Bitfield { .. } => MessageId::Bitfield,
            Message::Request { .. } => MessageId::Request,
            Message::Piece { .. } => MessageId::Piece,
            Message::Cancel { .. } => MessageId::Cancel,
            Message::Port { .. } => MessageId::Port,
            Message::Suggest { .. } => MessageId::Suggest,
            Message::HaveAll => MessageId::HaveAll,
            Message::HaveNone => MessageId::HaveNone,
            Message::RejectRequest { .. } => MessageId::RejectRequest,
            Message::AllowedFast { .. } => MessageId::AllowedFast,
        })
    }

    fn payload_len(&self) -> usize {
        match self {
            Message::KeepAlive
            | Message::Choke
            | Message::Unchoke
            | Message::Interested
            | Message::NotInterested
            | Message::HaveAll
            | Message::HaveNone => 0,
            Message::Have { .. } | Message::Suggest { .. } | Message::AllowedFast { .. } => 4,
            Message::Port { .. } => 2,
            Message::Request { .. } | Message::Cancel { .. } | Message::RejectRequest { .. } => 12,
            Message::Bitfield { bitfield } => bitfield.len(),
            Message::Piece { data, .. } => 8 + data.len(),
        }
    }

    /// Write the payload only; the frame header is added by [`Message::encode`]
    fn write_payload(&self, buf: &mut BytesMut) {
        match self {
            Message::Have { piece_index }
            | Message::Suggest { piece_index }
            | Message::AllowedFast { piece_index } => buf.put_u32(*piece_index),
            Message::Bitfield { bitfield } => buf.put_slice(bitfield),
            Message::Request { block }
            | Message::Cancel { block }
            | Message::RejectRequest { block } => {
                buf.put_u32(block.piece_index);
                buf.put_u32(block.offset);
                buf.put_u32(block.length);
            }
            Message::Piece {
                piece_index,
                offset,
                data,
            } => {
                buf.put_u32(*piece_index);
                buf.put_u32(*offset);
                buf.put_slice(data);
            }
            Message::Port { port } => buf.put_u16(*port),
            _ => {}
        }
    }

    /// Append one frame: <length prefix><message ID><payload>
    pub fn encode(&self, buf: &mut BytesMut) {
        let Some(id) = self.id() else {
            buf.put_u32(0);
            return;
        };
        let payload_len = self.payload_len();
        buf.reserve(LENGTH_PREFIX_LEN + 1 + payload_len);
        buf.put_u32((1 + payload_len) as u32);
        buf.put_u8(id as u8);
        self.write_payload(buf);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a single frame with the default length limit
    pub fn decode(src: &mut BytesMut) -> Result<Self> {
        FrameCodec::default().decode_frame(src)
    }
}

fn incomplete(needed: usize, available: usize) -> PeerWireError {
    PeerWireError::IncompleteMessage { needed, available }
}

fn read_u32(payload: &mut &[u8]) -> Result<u32> {
    if payload.remaining() < 4 {
        return Err(incomplete(4, payload.remaining()));
    }
    Ok(payload.get_u32())
}

fn read_u16(payload: &mut &[u8]) -> Result<u16> {
    if payload.remaining() < 2 {
        return Err(incomplete(2, payload.remaining()));
    }
    Ok(payload.get_u16())
}

fn read_block(payload: &mut &[u8]) -> Result<BlockInfo> {
    if payload.remaining() < 12 {
        return Err(incomplete(12, payload.remaining()));
    }
    Ok(BlockInfo::new(
        payload.get_u32(),
        payload.get_u32(),
        payload.get_u32(),
    ))
}

fn read_rest(payload: &mut &[u8]) -> Bytes {
    let rest = Bytes::copy_from_slice(*payload);
    payload.advance(rest.len());
    rest
}

/// The id-to-decoder table
fn read_payload(id: MessageId, payload: &mut &[u8]) -> Result<Message> {
    Ok(match id {
        MessageId::Choke => Message::Choke,
        MessageId::Unchoke => Message::Unchoke,
        MessageId::Interested => Message::Interested,
        MessageId::NotInterested => Message::NotInterested,
        MessageId::Have => Message::Have {
            piece_index: read_u32(payload)?,
        },
        MessageId::Bitfield => Message::Bitfield {
            bitfield: read_rest(payload),
        },
        MessageId::Request => Message::Request {
            block: read_block(payload)?,
        },
        MessageId::Piece => {
            let piece_index = read_u32(payload)?;
            let offset = read_u32(payload)?;
            Message::Piece {
                piece_index,
                offset,
                data: read_rest(payload),
            }
        }
        MessageId::Cancel => Message::Cancel {
            block: read_block(payload)?,
        },
        MessageId::Port => Message::Port {
            port: read_u16(payload)?,
        },
        MessageId::Suggest => Message::Suggest {
            piece_index: read_u32(payload)?,
        },
        MessageId::HaveAll => Message::HaveAll,
        MessageId::HaveNone => Message::HaveNone,
        MessageId::RejectRequest => Message::RejectRequest {
            block: read_block(payload)?,
        },
        MessageId::AllowedFast => Message::AllowedFast {
            piece_index: read_u32(payload)?,
        },
    })
}

/// Frames and parses messages on an in-memory buffer.
///
/// Decoding leaves `src` untouched on error and positioned on the next frame
/// boundary on success. The [`Decoder`] and [`Encoder`] impls let it drive a
/// `tokio_util::codec::Framed` stream.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Total size of the frame at the start of `src`, if its length prefix is there
    pub fn frame_len(&self, src: &[u8]) -> Result<Option<usize>> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }
        let declared = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if declared > self.max_frame_len {
            let id = src.get(LENGTH_PREFIX_LEN).copied().unwrap_or_default();
            return Err(PeerWireError::MalformedMessage {
                id,
                reason: format!(
                    "declared length {} exceeds limit {}",
                    declared, self.max_frame_len
                ),
            });
        }
        Ok(Some(LENGTH_PREFIX_LEN + declared))
    }

    /// Decode the frame at the start of `src`, which must already be whole
    pub fn decode_frame(&self, src: &mut BytesMut) -> Result<Message> {
        let total = self
            .frame_len(src)?
            .ok_or_else(|| incomplete(LENGTH_PREFIX_LEN, src.len()))?;
        if src.len() < total {
            return Err(incomplete(total, src.len()));
        }

        if total == LENGTH_PREFIX_LEN {
            src.advance(total);
            return Ok(Message::KeepAlive);
        }

        let raw_id = src[LENGTH_PREFIX_LEN];
        let id = MessageId::try_from(raw_id)?;

        let mut payload = &src[LENGTH_PREFIX_LEN + 1..total];
        let message = read_payload(id, &mut payload)?;
        if !payload.is_empty() {
            return Err(PeerWireError::MalformedMessage {
                id: raw_id,
                reason: format!(
                    "{} bytes declared, {} left unread",
                    total - LENGTH_PREFIX_LEN,
                    payload.len()
                ),
            });
        }

        src.advance(total);
        Ok(message)
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = PeerWireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match self.frame_len(src)? {
            Some(total) if src.len() >= total => self.decode_frame(src).map(Some),
            Some(total) => {
                src.reserve(total - src.len());
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = PeerWireError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        message.encode(dst);
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}
