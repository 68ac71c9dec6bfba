use super::{FrameCodec, Handshake, Message, HANDSHAKE_LEN};
use crate::error::{PeerWireError, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info};

/// Framed message exchange with one peer over any byte stream
pub struct PeerConnection<S> {
    addr: SocketAddr,
    framed: Framed<S, FrameCodec>,
    remote: Handshake,
    am_choking: bool,
    am_interested: bool,
}

impl PeerConnection<TcpStream> {
    /// Connect to a peer and perform handshake
    pub async fn connect(addr: SocketAddr, local: &Handshake, codec: FrameCodec) -> Result<Self> {
        info!("Connecting to peer: {}", addr);

        let stream = TcpStream::connect(addr).await?;
        Self::establish(stream, addr, local, codec).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> PeerConnection<S> {
    /// Exchange handshakes on an already open stream
    pub async fn establish(
        mut stream: S,
        addr: SocketAddr,
        local: &Handshake,
        codec: FrameCodec,
    ) -> Result<Self> {
        stream.write_all(&local.to_bytes()).await?;
        debug!("Sent handshake to {}", addr);

        let mut handshake_buf = [0u8; HANDSHAKE_LEN];
        stream.read_exact(&mut handshake_buf).await?;
        let remote = Handshake::from_bytes(&handshake_buf)?;

        if remote.info_hash != local.info_hash {
            return Err(PeerWireError::InvalidHandshake(
                "info hash mismatch".to_string(),
            ));
        }

        info!(
            "Handshake with {} complete (peer {}, {:?})",
            addr, remote.peer_id, remote.capabilities
        );

        Ok(Self {
            addr,
            framed: Framed::new(stream, codec),
            remote,
            am_choking: true,
            am_interested: false,
        })
    }

    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.framed.send(message.clone()).await?;

        match message {
            Message::Choke => self.am_choking = true,
            Message::Unchoke => self.am_choking = false,
            Message::Interested => self.am_interested = true,
            Message::NotInterested => self.am_interested = false,
            _ => {}
        }

        debug!("Sent message to {}: {:?}", self.addr, message);
        Ok(())
    }

    /// Wait for the next whole frame and decode it
    pub async fn receive(&mut self) -> Result<Message> {
        match self.framed.next().await {
            Some(message) => {
                let message = message?;
                debug!("Received message from {}: {:?}", self.addr, message);
                Ok(message)
            }
            None => Err(PeerWireError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{} closed the connection", self.addr),
            ))),
        }
    }

    pub fn remote(&self) -> &Handshake {
        &self.remote
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn am_choking(&self) -> bool {
        self.am_choking
    }

    pub fn am_interested(&self) -> bool {
        self.am_interested
    }
}
