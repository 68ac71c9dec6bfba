use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use clap::{Parser, Subcommand};
use peerwire::peer::PeerId;
use peerwire::wire::{FrameCodec, Handshake, Message, DEFAULT_MAX_FRAME_LEN};
use peerwire::SessionConfig;

#[derive(Parser)]
#[command(name = "peerwire")]
#[command(about = "Inspect BitTorrent peer-wire frames", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every frame in a hex-encoded buffer
    Decode {
        /// Frame bytes as hex
        frames: String,

        /// Largest accepted frame length
        #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
        max_frame_len: usize,
    },

    /// Print the Have frame for a piece index
    Have {
        /// Piece index
        index: u32,
    },

    /// Print our handshake for a torrent
    Handshake {
        /// Info hash as 40 hex characters
        info_hash: String,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Decode {
                frames,
                max_frame_len,
            } => {
                let codec = FrameCodec::new(*max_frame_len);
                let bytes = decode_hex(frames)?;
                let mut src = BytesMut::from(&bytes[..]);
                let mut count = 0;

                while !src.is_empty() {
                    let offset = bytes.len() - src.len();
                    let message = codec
                        .decode_frame(&mut src)
                        .with_context(|| format!("frame at byte {}", offset))?;
                    println!("{:>6}: {:?}", offset, message);
                    count += 1;
                }

                println!("{} frame(s)", count);
            }

            Commands::Have { index } => {
                let frame = Message::Have {
                    piece_index: *index,
                }
                .to_bytes();
                println!("{}", hex::encode(frame));
            }

            Commands::Handshake { info_hash } => {
                let bytes = decode_hex(info_hash)?;
                let Ok(info_hash) = <[u8; 20]>::try_from(bytes.as_slice()) else {
                    bail!("info hash must be 20 bytes, got {}", bytes.len());
                };

                let config = SessionConfig::default();
                let handshake = Handshake::new(config.capabilities, info_hash, PeerId::generate());
                print_handshake(&handshake);
            }
        }

        Ok(())
    }
}

fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).context("invalid hex input")
}

fn print_handshake(handshake: &Handshake) {
    println!("Handshake");
    println!("=========");
    println!("Peer ID: {}", handshake.peer_id);
    println!("Capabilities: {:?}", handshake.capabilities);
    println!("Bytes: {}", hex::encode(handshake.to_bytes()));
}
